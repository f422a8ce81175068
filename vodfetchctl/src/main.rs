use clap::Parser;

fn main() {
    let cli = vodfetchctl::Cli::parse();
    if let Err(err) = vodfetchctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
