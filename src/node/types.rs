use bitcoin::{Amount, BlockHash, SignedAmount, Txid};
use serde::Deserialize;
use serde_json::Value;

/// `gettransaction` result with `verbose = true`.
///
/// Only the fields the verifier reads are modelled. Block fields are absent while the
/// transaction is unconfirmed, and `fee` is only reported to the sending wallet.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRecord {
    pub txid: Txid,
    #[serde(default)]
    pub blockheight: Option<u64>,
    #[serde(default)]
    pub blockhash: Option<BlockHash>,
    /// Negative when the queried wallet paid it.
    #[serde(default, with = "bitcoin::amount::serde::as_btc::opt")]
    pub fee: Option<SignedAmount>,
    pub decoded: DecodedTransaction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecodedTransaction {
    #[serde(default)]
    pub vin: Vec<Value>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxOutput {
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub value: Amount,
    #[serde(default)]
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub address: Option<String>,
    /// Legacy rendering, still emitted for bare multisig by older nodes.
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl ScriptPubKey {
    pub fn owning_addresses(&self) -> impl Iterator<Item = &str> {
        self.address
            .iter()
            .chain(self.addresses.iter())
            .map(String::as_str)
    }

    pub fn is_owned_by(&self, address: &str) -> bool {
        self.owning_addresses().any(|owner| owner == address)
    }
}

impl DecodedTransaction {
    /// First output whose owning-address set contains `address`.
    pub fn output_for(&self, address: &str) -> Option<&TxOutput> {
        self.vout
            .iter()
            .find(|output| output.script_pub_key.is_owned_by(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TXID: &str = "abc0000000000000000000000000000000000000000000000000000000000def";
    const BLOCK_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000101";

    #[test]
    fn test_deserialize_confirmed_transaction() {
        let record: TransactionRecord = serde_json::from_value(json!({
            "amount": -0.3,
            "fee": -0.0001,
            "confirmations": 1,
            "blockhash": BLOCK_HASH,
            "blockheight": 101,
            "txid": TXID,
            "decoded": {
                "vin": [{ "txid": TXID, "vout": 0 }],
                "vout": [
                    {
                        "value": 0.1999,
                        "n": 0,
                        "scriptPubKey": { "address": "bcrt1qchange", "type": "witness_v0_keyhash" }
                    },
                    {
                        "value": 0.3,
                        "n": 1,
                        "scriptPubKey": { "address": "bcrt1qcounterparty", "type": "witness_v0_keyhash" }
                    }
                ]
            }
        }))
        .unwrap();

        assert_eq!(record.txid.to_string(), TXID);
        assert_eq!(record.blockheight, Some(101));
        assert_eq!(record.blockhash.unwrap().to_string(), BLOCK_HASH);
        assert_eq!(record.fee, Some(SignedAmount::from_sat(-10_000)));
        assert_eq!(record.decoded.vin.len(), 1);
        assert_eq!(record.decoded.vout[0].value, Amount::from_sat(19_990_000));
        assert_eq!(record.decoded.vout[1].n, 1);
        assert_eq!(
            record.decoded.vout[0].script_pub_key.kind.as_deref(),
            Some("witness_v0_keyhash")
        );
    }

    #[test]
    fn test_deserialize_unconfirmed_transaction() {
        let record: TransactionRecord = serde_json::from_value(json!({
            "txid": TXID,
            "confirmations": 0,
            "decoded": { "vin": [], "vout": [] }
        }))
        .unwrap();

        assert_eq!(record.blockheight, None);
        assert_eq!(record.blockhash, None);
        assert_eq!(record.fee, None);
    }

    #[test]
    fn test_output_lookup_uses_membership() {
        let decoded: DecodedTransaction = serde_json::from_value(json!({
            "vin": [],
            "vout": [
                { "value": 1.0, "n": 0, "scriptPubKey": { "addresses": ["bcrt1qalice", "bcrt1qbob"] } },
                { "value": 2.0, "n": 1, "scriptPubKey": { "type": "nulldata" } },
                { "value": 3.0, "n": 2, "scriptPubKey": { "address": "bcrt1qcarol" } }
            ]
        }))
        .unwrap();

        assert_eq!(decoded.output_for("bcrt1qbob").map(|o| o.n), Some(0));
        assert_eq!(decoded.output_for("bcrt1qcarol").map(|o| o.n), Some(2));
        assert!(decoded.output_for("bcrt1qdave").is_none());
        assert!(decoded.output_for("bcrt1q").is_none());
    }
}
