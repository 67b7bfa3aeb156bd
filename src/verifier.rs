use std::fmt;

use bitcoin::{Amount, Txid};
use thiserror::Error;
use tracing::{debug, info};

use crate::fixture::ExpectationRecord;
use crate::node::{DecodedTransaction, RpcError, TransactionRecord, TransactionSource};

const EXPECTED_INPUTS: usize = 1;
const EXPECTED_OUTPUTS: usize = 2;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("failed to retrieve transaction: {0}")]
    Retrieval(#[from] RpcError),
    #[error("node returned transaction {returned} when asked for {requested}")]
    TxidMismatch { requested: Txid, returned: Txid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    BlockHeight,
    BlockHash,
    InputCount,
    OutputCount,
    ChangeOutput,
    CounterpartyOutput,
    Fee,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Check::BlockHeight => "block height",
            Check::BlockHash => "block hash",
            Check::InputCount => "input count",
            Check::OutputCount => "output count",
            Check::ChangeOutput => "change output",
            Check::CounterpartyOutput => "counterparty output",
            Check::Fee => "fee",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Mismatch { expected: String, actual: String },
    NoMatchingOutput { address: String },
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Mismatch { expected, actual } => write!(f, "expected {expected}, got {actual}"),
            Failure::NoMatchingOutput { address } => write!(f, "no matching output pays {address}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub check: Check,
    pub outcome: Result<(), Failure>,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(()) => write!(f, "[PASS] {}", self.check),
            Err(failure) => write!(f, "[FAIL] {}: {failure}", self.check),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub txid: Txid,
    pub results: Vec<CheckResult>,
}

impl VerificationReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(CheckResult::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|result| !result.passed())
    }

    pub fn result(&self, check: Check) -> Option<&CheckResult> {
        self.results.iter().find(|result| result.check == check)
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let passed = self.results.iter().filter(|r| r.passed()).count();
        write!(
            f,
            "transaction {}: {passed}/{} checks passed",
            self.txid,
            self.results.len()
        )?;
        for result in &self.results {
            write!(f, "\n  {result}")?;
        }
        Ok(())
    }
}

/// Fetches the transaction named by `expected` and checks it.
///
/// Only retrieval problems and a txid that does not correlate abort the run.
pub async fn verify<S>(
    source: &S,
    expected: &ExpectationRecord,
) -> Result<VerificationReport, VerifyError>
where
    S: TransactionSource + ?Sized,
{
    info!(txid = %expected.txid, "Fetching transaction from node");
    let record = source.get_transaction(&expected.txid).await?;

    if record.txid != expected.txid {
        return Err(VerifyError::TxidMismatch {
            requested: expected.txid,
            returned: record.txid,
        });
    }

    Ok(compare(expected, &record))
}

/// Runs every check of `record` against `expected`. A failed check never stops
/// the ones after it.
pub fn compare(expected: &ExpectationRecord, record: &TransactionRecord) -> VerificationReport {
    let results = vec![
        CheckResult {
            check: Check::BlockHeight,
            outcome: exact(expected.block_height, record.blockheight),
        },
        CheckResult {
            check: Check::BlockHash,
            outcome: exact(expected.block_hash, record.blockhash),
        },
        CheckResult {
            check: Check::InputCount,
            outcome: exact(EXPECTED_INPUTS, Some(record.decoded.vin.len())),
        },
        CheckResult {
            check: Check::OutputCount,
            outcome: exact(EXPECTED_OUTPUTS, Some(record.decoded.vout.len())),
        },
        CheckResult {
            check: Check::ChangeOutput,
            outcome: output_pays(
                &record.decoded,
                &expected.miner_change_address,
                expected.miner_change_amount,
            ),
        },
        CheckResult {
            check: Check::CounterpartyOutput,
            outcome: output_pays(
                &record.decoded,
                &expected.counterparty_address,
                expected.counterparty_amount,
            ),
        },
        CheckResult {
            check: Check::Fee,
            outcome: exact(expected.fee, record.fee.map(|fee| fee.unsigned_abs())),
        },
    ];

    let report = VerificationReport {
        txid: record.txid,
        results,
    };
    debug!(txid = %report.txid, success = report.is_success(), "Compared transaction");
    report
}

fn exact<T: PartialEq + fmt::Display>(expected: T, actual: Option<T>) -> Result<(), Failure> {
    match actual {
        Some(actual) if actual == expected => Ok(()),
        Some(actual) => Err(Failure::Mismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }),
        None => Err(Failure::Mismatch {
            expected: expected.to_string(),
            actual: "none".to_string(),
        }),
    }
}

fn output_pays(decoded: &DecodedTransaction, address: &str, amount: Amount) -> Result<(), Failure> {
    let output = decoded
        .output_for(address)
        .ok_or_else(|| Failure::NoMatchingOutput {
            address: address.to_string(),
        })?;
    exact(amount, Some(output.value))
}
