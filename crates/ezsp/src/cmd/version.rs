use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("ezsp {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: ezsp");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("EZSP_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: host={}, async={}, cli=true",
        cfg!(feature = "host"),
        cfg!(feature = "async")
    );
    println!("ash_version: {}", ezsp_ash::ASH_VERSION);
    println!(
        "default_protocol_version: {}",
        ezsp_host::DEFAULT_PROTOCOL_VERSION
    );
    println!("schema_commands: {}", ezsp_schema::COMMANDS.len());

    Ok(SUCCESS)
}
