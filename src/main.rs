use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use tracing_subscriber::EnvFilter;

use mytoken::{
    accounts::{Address, Signer},
    config::TokenConfig,
    ledger::Amount,
    store,
    token::Token,
    units::{format_units, parse_units},
};

#[derive(Parser)]
#[command(name = "mytoken", version, about = "MyToken ledger: taxed ERC20-style transfers")]
struct Cli {
    /// Token state file (JSON)
    #[arg(long, global = true, default_value = "mytoken.state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an ed25519 keypair: sk.hex, pk.hex, address.txt
    Keygen {
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Deploy a fresh token; the caller becomes the owner
    Deploy {
        #[arg(long)]
        sk_hex: String,
        /// JSON deployment parameters; defaults apply to missing fields
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    Transfer {
        #[arg(long)]
        sk_hex: String,
        #[arg(long)]
        to: Address,
        /// Whole-token amount, e.g. 100 or 0.5
        #[arg(long)]
        amount: String,
    },
    Approve {
        #[arg(long)]
        sk_hex: String,
        #[arg(long)]
        spender: Address,
        #[arg(long)]
        amount: String,
    },
    TransferFrom {
        #[arg(long)]
        sk_hex: String,
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        #[arg(long)]
        amount: String,
    },
    SetTaxFee {
        #[arg(long)]
        sk_hex: String,
        #[arg(long)]
        percent: u8,
    },
    SetTaxReceiver {
        #[arg(long)]
        sk_hex: String,
        #[arg(long)]
        receiver: Address,
    },
    SetMaxTx {
        #[arg(long)]
        sk_hex: String,
        #[arg(long)]
        amount: String,
    },
    SetMaxWallet {
        #[arg(long)]
        sk_hex: String,
        #[arg(long)]
        amount: String,
    },
    /// Accepted and ignored: ownership is permanent
    RenounceOwnership {
        #[arg(long)]
        sk_hex: String,
    },
    /// Accepted and ignored: ownership is permanent
    TransferOwnership {
        #[arg(long)]
        sk_hex: String,
        #[arg(long)]
        new_owner: Address,
    },
    Balance {
        #[arg(long)]
        address: Address,
    },
    /// Print supply, owner, tax and limits
    Info,
    /// Print the event log as JSON lines
    Events,
}

//==================== helpers ====================//

fn signer(sk_hex: &str) -> Result<Signer> {
    Signer::from_secret_hex(sk_hex).context("invalid --sk-hex (expected 64 hex chars)")
}

fn amount_arg(token: &Token, text: &str) -> Result<Amount> {
    parse_units(text, token.decimals()).with_context(|| format!("invalid amount {text:?}"))
}

fn fmt_amount(token: &Token, amount: Amount) -> String {
    format!("{} {}", format_units(amount, token.decimals()), token.symbol())
}

fn load(path: &Path) -> Result<Token> {
    Ok(store::load(path)?)
}

fn save(path: &Path, token: &Token) -> Result<()> {
    Ok(store::save(path, token)?)
}

/// Loads the state, applies `op` as the caller, and saves only on success.
fn with_token<F>(state: &Path, sk_hex: &str, op: F) -> Result<()>
where
    F: FnOnce(&mut Token, &Address) -> Result<String>,
{
    let caller = signer(sk_hex)?.address();
    let mut token = load(state)?;
    let message = op(&mut token, &caller)?;
    save(state, &token)?;
    println!("{message}");
    Ok(())
}

//==================== commands ====================//

fn keygen_cmd(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("mkdir {}", out_dir.display()))?;
    let signer = Signer::generate(&mut OsRng);
    fs::write(out_dir.join("sk.hex"), signer.secret_hex())?;
    fs::write(out_dir.join("pk.hex"), hex::encode(signer.verifying_key().as_bytes()))?;
    fs::write(out_dir.join("address.txt"), signer.address().to_string())?;
    println!("keypair written → {} ({})", out_dir.display(), signer.address());
    Ok(())
}

fn deploy_cmd(state: &Path, sk_hex: &str, config: Option<&Path>, force: bool) -> Result<()> {
    if state.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", state.display());
    }
    let deployer = signer(sk_hex)?.address();
    let config = match config {
        Some(path) => TokenConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TokenConfig::default(),
    };
    let params = config.resolve().context("invalid token config")?;
    let token = Token::deploy(deployer, params)?;
    save(state, &token)?;
    println!(
        "Deployed {} ({}) → {}, owner {}, supply {}",
        token.name(),
        token.symbol(),
        state.display(),
        token.owner(),
        fmt_amount(&token, token.total_supply())
    );
    Ok(())
}

fn info_cmd(state: &Path) -> Result<()> {
    let token = load(state)?;
    println!("name:           {}", token.name());
    println!("symbol:         {}", token.symbol());
    println!("decimals:       {}", token.decimals());
    println!("total supply:   {}", fmt_amount(&token, token.total_supply()));
    println!("owner:          {}", token.owner());
    println!("tax receiver:   {}", token.tax_receiver());
    println!("tax fee:        {}%", token.tax_fee());
    println!("max tx:         {}", fmt_amount(&token, token.max_tx_amount()));
    println!("max wallet:     {}", fmt_amount(&token, token.max_wallet_amount()));
    println!("holders:        {}", token.ledger().balances().len());
    println!("height:         {}", token.ledger().meta.height);
    println!("state root:     {}", hex::encode(token.ledger().state_root()));
    Ok(())
}

fn events_cmd(state: &Path) -> Result<()> {
    let token = load(state)?;
    for event in token.events() {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let state = cli.state.as_path();
    match cli.command {
        Command::Keygen { out_dir } => keygen_cmd(&out_dir),
        Command::Deploy {
            sk_hex,
            config,
            force,
        } => deploy_cmd(state, &sk_hex, config.as_deref(), force),
        Command::Transfer { sk_hex, to, amount } => with_token(state, &sk_hex, |token, caller| {
            let amount = amount_arg(token, &amount)?;
            let quote = token.transfer_quoted(caller, &to, amount)?;
            Ok(format!(
                "{caller} → {to}: {} (fee {})",
                fmt_amount(token, quote.net),
                fmt_amount(token, quote.fee)
            ))
        }),
        Command::Approve {
            sk_hex,
            spender,
            amount,
        } => with_token(state, &sk_hex, |token, caller| {
            let amount = amount_arg(token, &amount)?;
            token.approve(caller, &spender, amount)?;
            Ok(format!("{caller} approved {spender} for {}", fmt_amount(token, amount)))
        }),
        Command::TransferFrom {
            sk_hex,
            from,
            to,
            amount,
        } => with_token(state, &sk_hex, |token, caller| {
            let amount = amount_arg(token, &amount)?;
            let quote = token.transfer_from_quoted(caller, &from, &to, amount)?;
            Ok(format!(
                "{from} → {to} by {caller}: {} (fee {})",
                fmt_amount(token, quote.net),
                fmt_amount(token, quote.fee)
            ))
        }),
        Command::SetTaxFee { sk_hex, percent } => with_token(state, &sk_hex, |token, caller| {
            token.set_tax_fee(caller, percent)?;
            Ok(format!("tax fee set to {percent}%"))
        }),
        Command::SetTaxReceiver { sk_hex, receiver } => {
            with_token(state, &sk_hex, |token, caller| {
                token.set_tax_receiver(caller, &receiver)?;
                Ok(format!("tax receiver set to {receiver}"))
            })
        }
        Command::SetMaxTx { sk_hex, amount } => with_token(state, &sk_hex, |token, caller| {
            let amount = amount_arg(token, &amount)?;
            token.set_max_tx_amount(caller, amount)?;
            Ok(format!("max tx set to {}", fmt_amount(token, amount)))
        }),
        Command::SetMaxWallet { sk_hex, amount } => with_token(state, &sk_hex, |token, caller| {
            let amount = amount_arg(token, &amount)?;
            token.set_max_wallet_amount(caller, amount)?;
            Ok(format!("max wallet set to {}", fmt_amount(token, amount)))
        }),
        Command::RenounceOwnership { sk_hex } => with_token(state, &sk_hex, |token, caller| {
            token.renounce_ownership(caller)?;
            Ok(format!("ownership unchanged: {}", token.owner()))
        }),
        Command::TransferOwnership { sk_hex, new_owner } => {
            with_token(state, &sk_hex, |token, caller| {
                token.transfer_ownership(caller, &new_owner)?;
                Ok(format!("ownership unchanged: {}", token.owner()))
            })
        }
        Command::Balance { address } => {
            let token = load(state)?;
            println!("{}", fmt_amount(&token, token.balance_of(&address)));
            Ok(())
        }
        Command::Info => info_cmd(state),
        Command::Events => events_cmd(state),
    }
}

//==================== main ====================//

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
