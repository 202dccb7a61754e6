use zoomeye::data_models::{HistoryResult, Kind, ResourcesInfo, SearchResult};
use zoomeye::record::value_to_string;
use zoomeye::FilterRecord;

const MAX_WIDTH: usize = 75;

fn omit(s: &str, max: usize) -> String {
    let s = s.replace(['\r', '\n', '\t'], " ");
    if s.chars().count() <= max {
        return s;
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

pub fn print_info(info: &ResourcesInfo) {
    println!("[ZoomEye Resources Info]");
    println!("  Role:  {}", info.plan);
    println!("  Quota: {}", info.resources.search);
}

pub fn print_count(result: &SearchResult) {
    println!("[ZoomEye Total]");
    println!("  Count: {}", result.total);
}

pub fn print_facets(result: &SearchResult, names: &[String]) {
    println!("[Facets Info]");
    for name in names {
        let Some(rows) = result.facet(name) else {
            continue;
        };
        println!("  {}:", name.trim());
        for row in rows {
            println!(
                "    {:<35} {:>10} {:>6.2}%",
                omit(&row.label(), 35),
                row.count,
                percent(row.count, result.total)
            );
        }
    }
}

pub fn print_stats(result: &SearchResult, keys: &[String]) {
    println!("[Statistics Info]");
    let total = result.matches.len() as u64;
    let mut stats: Vec<_> = result.statistics(keys).into_iter().collect();
    stats.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, tally) in stats {
        println!("  {key}:");
        let mut rows: Vec<_> = tally.into_iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (name, count) in rows {
            println!(
                "    {:<35} {:>10} {:>6.2}%",
                omit(&name, 35),
                count,
                percent(count as u64, total)
            );
        }
    }
}

pub fn print_filter(records: &[FilterRecord]) {
    println!("[Filtered Data]");
    for record in records {
        println!("  {}", omit(&record.index_value, 30));
        for (key, value) in &record.fields {
            println!(
                "    {:<12} {}",
                key.to_uppercase(),
                omit(&value_to_string(value), MAX_WIDTH)
            );
        }
    }
    println!("  Total: {}", records.len());
}

pub fn print_data(result: &SearchResult) {
    match result.kind() {
        Kind::Host => {
            println!("[Host Search Result]");
            for m in &result.matches {
                println!(
                    "  {:<21} {:<20} {:<20} {:<20} {}",
                    omit(&format!("{}:{}", m.find_string("ip"), m.find_string("portinfo.port")), 21),
                    omit(&m.find_string("portinfo.app"), 20),
                    omit(&m.find_string("portinfo.service"), 20),
                    omit(&m.find_string("geoinfo.country.names.en"), 20),
                    omit(&m.find_string("portinfo.banner"), 40),
                );
            }
        }
        Kind::Web => {
            println!("[Web Search Result]");
            for m in &result.matches {
                println!("  {}", omit(&m.find_string("site"), 30));
                for (label, path) in [
                    ("IP", "ip"),
                    ("Domains", "domains"),
                    ("Title", "title"),
                    ("Country", "geoinfo.country.names.en"),
                ] {
                    println!("    {label:<12} {}", omit(&m.find_string(path), MAX_WIDTH));
                }
            }
        }
    }
    println!("  Total: {}", result.matches.len());
}

pub fn print_history(history: &HistoryResult) {
    println!("[IP History]");
    println!("  Count: {}", history.count);
    for record in &history.data {
        println!(
            "  {:<25} {:<8} {:<20} {}",
            omit(&record.find_string("timestamp"), 25),
            record.find_string("portinfo.port"),
            omit(&record.find_string("portinfo.service"), 20),
            omit(&record.find_string("portinfo.app"), 40),
        );
    }
}
