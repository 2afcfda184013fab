use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct VersionArgs {
    /// Also show build details
    #[arg(short = 'd', long = "detailed")]
    pub detailed: bool,
}

pub async fn execute(args: VersionArgs) -> Result<()> {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if args.detailed {
        println!("{}", env!("CARGO_PKG_DESCRIPTION"));
        println!("Edition: 2024");
        println!("License: {}", env!("CARGO_PKG_LICENSE"));
        println!(
            "Profile: {}",
            if cfg!(debug_assertions) { "debug" } else { "release" }
        );
        println!("Target: {}-{}", std::env::consts::ARCH, std::env::consts::OS);
    }

    Ok(())
}
