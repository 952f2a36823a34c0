#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = quizcheck::run().await {
        eprintln!("quizcheck fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
