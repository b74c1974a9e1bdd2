// demos/request_token.rs

//! Requests an OAuth access token, answering Basic and Negotiate challenges.
//!
//! # Usage
//!
//! ## Prompt for credentials:
//! ```bash
//! cargo run --example request_token -- https://api.cluster.example.com:6443
//! ```
//!
//! ## With credentials:
//! ```bash
//! cargo run --example request_token -- https://api.cluster.example.com:6443 --username developer --password secret
//! ```
//!
//! ## Kerberos, authorization code grant:
//! ```bash
//! cargo run --example request_token --features gssapi -- https://api.cluster.example.com:6443 --code --principal user@EXAMPLE.COM
//! ```

use challenge_login::{default_challenge_handler, ClientConfig, PromptInput, RequestTokenOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: request_token <server-url> [OPTIONS]");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --username <user>    Username for Basic authentication");
        eprintln!("  --password <pass>    Password for Basic authentication");
        eprintln!("  --principal <name>   Kerberos client principal (with the gssapi feature)");
        eprintln!("  --insecure           Skip server certificate verification");
        eprintln!("  --code               Use the authorization code grant with discovered endpoints");
        std::process::exit(1);
    }

    let host = &args[1];

    let flag_value = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    let username = flag_value("--username");
    let password = flag_value("--password");
    let principal = flag_value("--principal");
    let insecure = args.contains(&"--insecure".to_string());
    let code_flow = args.contains(&"--code".to_string());

    let handler = default_challenge_handler(
        host,
        username,
        password,
        Some(PromptInput::Terminal),
        principal,
    );

    let config = ClientConfig::new(host.as_str()).insecure(insecure);
    let mut options = RequestTokenOptions::new(config, handler)?.token_flow(!code_flow);
    if code_flow {
        options.discover_oauth_config()?;
    }

    let token = options.request_token()?;
    println!("{token}");

    Ok(())
}
