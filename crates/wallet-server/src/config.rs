use std::{
    env,
    net::{AddrParseError, SocketAddr},
    path::PathBuf,
};

use ledger::DEFAULT_STARTING_CASH_USD;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STORE_PATH: &str = "data/wallets.json";
const DEFAULT_JOURNAL_PATH: &str = "artifacts/trades.csv";
const MEMORY_STORE: &str = "memory";

const ENV_ADDR: &str = "WALLET_SERVER_ADDR";
const ENV_STORE: &str = "WALLET_STORE_PATH";
const ENV_STARTING_CASH: &str = "WALLET_STARTING_CASH_USD";
const ENV_JOURNAL: &str = "WALLET_JOURNAL_PATH";
const ENV_EVENTS: &str = "WALLET_EVENTS_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    File(PathBuf),
}

impl StoreBackend {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case(MEMORY_STORE) {
            Self::Memory
        } else {
            Self::File(PathBuf::from(value))
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub store: StoreBackend,
    pub starting_cash_usd: f64,
    pub journal_path: PathBuf,
    pub events_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("WALLET_SERVER_ADDR is not a valid socket address: {0}")]
    InvalidListenAddr(#[source] AddrParseError),
    #[error("WALLET_STORE_PATH must not be empty or whitespace")]
    InvalidStorePath,
    #[error("WALLET_STARTING_CASH_USD must be a finite amount greater than 0")]
    InvalidStartingCash,
    #[error("WALLET_JOURNAL_PATH must not be empty or whitespace")]
    InvalidJournalPath,
    #[error("WALLET_EVENTS_PATH must not be empty or whitespace when set")]
    InvalidEventsPath,
    #[error("{0} contains non-unicode data")]
    NonUnicode(&'static str),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr = match read_env(ENV_ADDR)? {
            Some(value) => value.parse().map_err(ConfigError::InvalidListenAddr)?,
            None => DEFAULT_LISTEN_ADDR
                .parse()
                .map_err(ConfigError::InvalidListenAddr)?,
        };

        let store = match read_env(ENV_STORE)? {
            Some(value) => StoreBackend::parse(non_blank(value, ConfigError::InvalidStorePath)?.trim()),
            None => StoreBackend::File(PathBuf::from(DEFAULT_STORE_PATH)),
        };

        let starting_cash_usd = match read_env(ENV_STARTING_CASH)? {
            Some(value) => parse_positive_amount(&value).ok_or(ConfigError::InvalidStartingCash)?,
            None => DEFAULT_STARTING_CASH_USD,
        };

        let journal_path = match read_env(ENV_JOURNAL)? {
            Some(value) => PathBuf::from(non_blank(value, ConfigError::InvalidJournalPath)?),
            None => PathBuf::from(DEFAULT_JOURNAL_PATH),
        };

        let events_path = read_env(ENV_EVENTS)?
            .map(|value| non_blank(value, ConfigError::InvalidEventsPath).map(PathBuf::from))
            .transpose()?;

        Ok(Self {
            listen_addr,
            store,
            starting_cash_usd,
            journal_path,
            events_path,
        })
    }
}

fn read_env(key: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NonUnicode(key)),
    }
}

fn non_blank(value: String, invalid_error: ConfigError) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid_error);
    }
    Ok(value)
}

fn parse_positive_amount(value: &str) -> Option<f64> {
    let parsed = value.trim().parse::<f64>().ok()?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return None;
    }
    Some(parsed)
}
