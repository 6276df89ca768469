pub fn run() -> anyhow::Result<()> {
    println!("tracesift {}", env!("CARGO_PKG_VERSION"));
    println!("Signal mining and rollup for AI-agent session logs");
    Ok(())
}
