use std::path::Path;

pub fn run(root: Option<&Path>, json: bool) {
    let mut source = super::make_source(root);
    let info = source.info();

    let snap = match source.read() {
        Ok(snap) => snap,
        Err(e) => {
            eprintln!("Failed to read {}: {e}", info.name);
            std::process::exit(1);
        }
    };
    source.release();

    let residency_pct = if snap.total_ns == 0 {
        0.0
    } else {
        snap.deep_idle_ns as f64 / snap.total_ns as f64 * 100.0
    };

    if json {
        let out = serde_json::json!({
            "source": info,
            "deep_idle_ns": snap.deep_idle_ns,
            "total_ns": snap.total_ns,
            "transitions": snap.transitions,
            "residency_since_boot_pct": residency_pct,
        });
        match serde_json::to_string_pretty(&out) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Failed to encode JSON: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("Probing: {}", info.name);
    println!("  {}", info.description);
    if let Some(location) = &info.location {
        println!("  {location}");
    }
    println!();
    println!(
        "  Deep idle:       {:.3}s",
        snap.deep_idle_ns as f64 / 1e9
    );
    println!("  Since boot:      {:.3}s", snap.total_ns as f64 / 1e9);
    println!("  Residency:       {residency_pct:.2}%");
    println!("  Transitions:     {}", snap.transitions);
}
