fn main() -> anyhow::Result<()> {
    kore_assistant::init();

    let cli = kore_assistant::cli::Cli::parse_args();
    kore_assistant::cli::run(cli)
}
