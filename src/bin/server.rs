use clap::Parser;
use respd::{server, Error};

const HOST: &str = "127.0.0.1";
const PORT: u16 = 6379;

#[derive(Parser, Debug)]
struct Args {
    /// The host to bind to
    #[arg(long, default_value = HOST)]
    host: String,

    /// The port to listen on
    #[arg(short, long, default_value_t = PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    server::run(&args.host, args.port).await
}
