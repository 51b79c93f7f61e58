fn main() -> anyhow::Result<()> {
    friendplay::cli::run()
}
