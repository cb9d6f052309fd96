use anyhow::Result;

fn main() -> Result<()> {
    loadsmith::cli::run()
}
