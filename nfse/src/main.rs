use std::{net::SocketAddr, path::PathBuf};

use nfse::{
    app, config::Settings, credentials::Credentials, init_tracing, transport::HttpTransport,
    Context,
};

const HELP: &str = "
nfse

USAGE:
    nfse [options]

FLAGS:
    -h, --help              Print this message

OPTIONS
    -p, --port             Port to run nfse on (default: 3000)
    -H, --host             Host to run nfse on (default: 0.0.0.0)
    -c, --config           Settings file (default: config.json)

ENVIRONMENT
    RUST_LOG               Log filter (default: nfse=info,rps_sign=info)
    NFSE_ENDPOINT          Web service URL, overrides the settings file
";

struct AppArgs {
    /// Port on which the app should run.
    port: u16,
    /// Host to run the app on.
    host: String,
    /// JSON settings file.
    config: PathBuf,
}

fn parse_args() -> Result<AppArgs, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        eprintln!("{}", HELP);
        std::process::exit(1);
    }

    let args = AppArgs {
        port: pargs.opt_value_from_str(["-p", "--port"])?.unwrap_or(3000),
        host: pargs
            .opt_value_from_str(["-H", "--host"])?
            .unwrap_or_else(|| "0.0.0.0".into()),
        config: pargs
            .opt_value_from_str(["-c", "--config"])?
            .unwrap_or_else(|| "config.json".into()),
    };

    Ok(args)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = parse_args()?;

    let settings = Settings::load(&args.config).await?;
    let credentials = Credentials::load(&settings.cert_path, &settings.key_path).await?;
    let transport = HttpTransport::new(&settings.endpoint, &credentials)?;
    tracing::info!("Submitting to {}", settings.endpoint);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let ctx = Context::new(settings, credentials.into_key(), transport);

    warp::serve(app(ctx)).run(addr).await;
    Ok(())
}
