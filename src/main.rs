use pianoman::cli::run_cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    run_cli()
}
