fn main() -> anyhow::Result<()> {
    markdir::cli::run()
}
