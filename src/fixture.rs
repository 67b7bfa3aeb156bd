use std::fmt;
use std::path::Path;
use std::str::FromStr;

use bitcoin::{Amount, BlockHash, SignedAmount, Txid};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const FIXTURE_LINES: usize = 10;
const HASH_HEX_LEN: usize = 64;

/// Positional fields of the line-oriented fixture, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Txid,
    MinerInputAddress,
    MinerInputAmount,
    CounterpartyAddress,
    CounterpartyAmount,
    MinerChangeAddress,
    MinerChangeAmount,
    Fee,
    BlockHeight,
    BlockHash,
}

impl Field {
    pub const ALL: [Field; FIXTURE_LINES] = [
        Field::Txid,
        Field::MinerInputAddress,
        Field::MinerInputAmount,
        Field::CounterpartyAddress,
        Field::CounterpartyAmount,
        Field::MinerChangeAddress,
        Field::MinerChangeAmount,
        Field::Fee,
        Field::BlockHeight,
        Field::BlockHash,
    ];

    /// 1-based line number in the positional format.
    pub fn line(self) -> usize {
        Field::ALL.iter().position(|f| *f == self).unwrap_or(0) + 1
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Txid => "txid",
            Field::MinerInputAddress => "miner_input_address",
            Field::MinerInputAmount => "miner_input_amount",
            Field::CounterpartyAddress => "counterparty_address",
            Field::CounterpartyAmount => "counterparty_amount",
            Field::MinerChangeAddress => "miner_change_address",
            Field::MinerChangeAmount => "miner_change_amount",
            Field::Fee => "fee",
            Field::BlockHeight => "block_height",
            Field::BlockHash => "block_hash",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.name(), self.line())
    }
}

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("expected 10 lines, found {0}")]
    LineCount(usize),
    #[error("{0} is empty")]
    EmptyField(Field),
    #[error("{field} must be 64 hex characters, got {len}")]
    HashLength { field: Field, len: usize },
    #[error("{field} is not valid hex: {value}")]
    InvalidHash { field: Field, value: String },
    #[error("{field} is not a valid decimal amount: {value}")]
    InvalidAmount { field: Field, value: String },
    #[error("{field} is not a valid integer: {value}")]
    InvalidInteger { field: Field, value: String },
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: Field, value: String },
    #[error("malformed structured fixture: {0}")]
    Structured(#[from] toml::de::Error),
}

/// Fixture fields before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFixture {
    txid: String,
    miner_input_address: String,
    miner_input_amount: f64,
    counterparty_address: String,
    counterparty_amount: f64,
    miner_change_address: String,
    miner_change_amount: f64,
    fee: f64,
    block_height: i64,
    block_hash: String,
}

/// What the mined transaction is expected to look like.
///
/// Read either from the positional ten-line format or from a TOML record with
/// named fields. Both go through the same validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationRecord {
    pub txid: Txid,
    /// Parsed and validated, never compared against the node.
    pub miner_input_address: String,
    pub miner_input_amount: Amount,
    pub counterparty_address: String,
    pub counterparty_amount: Amount,
    pub miner_change_address: String,
    pub miner_change_amount: Amount,
    /// Fee magnitude; the producer may record it signed.
    pub fee: Amount,
    pub block_height: u64,
    /// Hex case is not significant: the hash is compared as bytes, not as text.
    pub block_hash: BlockHash,
}

impl ExpectationRecord {
    /// Reads a fixture from disk. `.toml` files use the named-field format,
    /// anything else the positional one.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let record = if is_toml {
            Self::from_toml(&text)?
        } else {
            Self::from_lines(&text)?
        };

        debug!(path = %path.display(), txid = %record.txid, "Parsed fixture");
        Ok(record)
    }

    /// Parses the positional ten-line format.
    pub fn from_lines(text: &str) -> Result<Self, FixtureError> {
        let lines: Vec<&str> = text.trim().lines().map(str::trim).collect();
        if lines.len() != FIXTURE_LINES {
            return Err(FixtureError::LineCount(lines.len()));
        }
        if let Some(idx) = lines.iter().position(|line| line.is_empty()) {
            return Err(FixtureError::EmptyField(Field::ALL[idx]));
        }

        let value = |field: Field| lines[field.line() - 1];
        let raw = RawFixture {
            txid: value(Field::Txid).to_string(),
            miner_input_address: value(Field::MinerInputAddress).to_string(),
            miner_input_amount: parse_decimal(Field::MinerInputAmount, value(Field::MinerInputAmount))?,
            counterparty_address: value(Field::CounterpartyAddress).to_string(),
            counterparty_amount: parse_decimal(Field::CounterpartyAmount, value(Field::CounterpartyAmount))?,
            miner_change_address: value(Field::MinerChangeAddress).to_string(),
            miner_change_amount: parse_decimal(Field::MinerChangeAmount, value(Field::MinerChangeAmount))?,
            fee: parse_decimal(Field::Fee, value(Field::Fee))?,
            block_height: value(Field::BlockHeight).parse().map_err(|_| FixtureError::InvalidInteger {
                field: Field::BlockHeight,
                value: value(Field::BlockHeight).to_string(),
            })?,
            block_hash: value(Field::BlockHash).to_string(),
        };

        Self::validate(raw)
    }

    /// Parses the named-field TOML format.
    pub fn from_toml(text: &str) -> Result<Self, FixtureError> {
        let raw: RawFixture = toml::from_str(text)?;
        let addresses = [
            (Field::MinerInputAddress, &raw.miner_input_address),
            (Field::CounterpartyAddress, &raw.counterparty_address),
            (Field::MinerChangeAddress, &raw.miner_change_address),
        ];
        if let Some((field, _)) = addresses.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(FixtureError::EmptyField(*field));
        }
        Self::validate(raw)
    }

    fn validate(raw: RawFixture) -> Result<Self, FixtureError> {
        let txid = parse_hash::<Txid>(Field::Txid, raw.txid.trim())?;
        let block_hash = parse_hash::<BlockHash>(Field::BlockHash, raw.block_hash.trim())?;

        let miner_input_amount = rounded_positive_amount(Field::MinerInputAmount, raw.miner_input_amount)?;
        let counterparty_amount = positive_amount(Field::CounterpartyAmount, raw.counterparty_amount)?;
        let miner_change_amount = positive_amount(Field::MinerChangeAmount, raw.miner_change_amount)?;
        let fee = positive_amount(Field::Fee, raw.fee.abs())?;

        if raw.block_height <= 0 {
            return Err(FixtureError::NotPositive {
                field: Field::BlockHeight,
                value: raw.block_height.to_string(),
            });
        }

        Ok(Self {
            txid,
            miner_input_address: raw.miner_input_address.trim().to_string(),
            miner_input_amount,
            counterparty_address: raw.counterparty_address.trim().to_string(),
            counterparty_amount,
            miner_change_address: raw.miner_change_address.trim().to_string(),
            miner_change_amount,
            fee,
            block_height: raw.block_height as u64,
            block_hash,
        })
    }

    /// Renders the record in the positional format, amounts in BTC.
    pub fn to_lines(&self) -> Vec<String> {
        vec![
            self.txid.to_string(),
            self.miner_input_address.clone(),
            self.miner_input_amount.to_btc().to_string(),
            self.counterparty_address.clone(),
            self.counterparty_amount.to_btc().to_string(),
            self.miner_change_address.clone(),
            self.miner_change_amount.to_btc().to_string(),
            self.fee.to_btc().to_string(),
            self.block_height.to_string(),
            self.block_hash.to_string(),
        ]
    }
}

impl fmt::Display for ExpectationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_lines().join("\n"))
    }
}

fn parse_decimal(field: Field, value: &str) -> Result<f64, FixtureError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FixtureError::InvalidAmount {
            field,
            value: value.to_string(),
        })
}

fn parse_hash<H: FromStr>(field: Field, value: &str) -> Result<H, FixtureError> {
    if value.len() != HASH_HEX_LEN {
        return Err(FixtureError::HashLength {
            field,
            len: value.len(),
        });
    }
    H::from_str(value).map_err(|_| FixtureError::InvalidHash {
        field,
        value: value.to_string(),
    })
}

/// Rounds to the nearest satoshi. Only for fields never compared with the node,
/// which the producer may have summed in floating point.
fn rounded_positive_amount(field: Field, btc: f64) -> Result<Amount, FixtureError> {
    let sats = (btc * Amount::ONE_BTC.to_sat() as f64).round();
    if !sats.is_finite() || sats > Amount::MAX_MONEY.to_sat() as f64 {
        return Err(FixtureError::InvalidAmount {
            field,
            value: btc.to_string(),
        });
    }
    if sats <= 0.0 {
        return Err(FixtureError::NotPositive {
            field,
            value: btc.to_string(),
        });
    }
    Ok(Amount::from_sat(sats as u64))
}

fn positive_amount(field: Field, btc: f64) -> Result<Amount, FixtureError> {
    let amount = SignedAmount::from_btc(btc).map_err(|_| FixtureError::InvalidAmount {
        field,
        value: btc.to_string(),
    })?;
    if amount <= SignedAmount::ZERO {
        return Err(FixtureError::NotPositive {
            field,
            value: btc.to_string(),
        });
    }
    Ok(amount.unsigned_abs())
}
