/// Client configuration: which program to target and which fee scheme to build for
/// Passed by value into the client, never read from process-wide state after construction

use crate::error::{ClientError, Result};
use crate::fees::{FeeRecipient, FeeSchedule};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Published Flash Loan Mastery program
pub const DEFAULT_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("1oanfPPN8r1i4UbugXHDxWMbWVJ5qLSN5qzNFZkz6Fg");

pub const ENV_PROGRAM_ID: &str = "FLASH_LOAN_PROGRAM_ID";
pub const ENV_REFERRAL_TOKEN: &str = "FLASH_LOAN_REFERRAL_TOKEN";
pub const ENV_FIXED_RECIPIENT: &str = "FLASH_LOAN_FIXED_RECIPIENT";
pub const ENV_COMMITMENT: &str = "FLASH_LOAN_COMMITMENT";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(with = "pubkey_string")]
    pub program_id: Pubkey,
    pub fee_schedule: FeeSchedule,
    pub fee_recipient: FeeRecipient,
    pub commitment: CommitmentLevel,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program_id: DEFAULT_PROGRAM_ID,
            fee_schedule: FeeSchedule::default(),
            fee_recipient: FeeRecipient::None,
            commitment: CommitmentLevel::Confirmed,
        }
    }
}

impl ClientConfig {
    pub fn with_program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = program_id;
        self
    }

    pub fn with_fee_schedule(mut self, fee_schedule: FeeSchedule) -> Self {
        self.fee_schedule = fee_schedule;
        self
    }

    pub fn with_fee_recipient(mut self, fee_recipient: FeeRecipient) -> Self {
        self.fee_recipient = fee_recipient;
        self
    }

    pub fn with_commitment(mut self, commitment: CommitmentLevel) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn commitment_config(&self) -> CommitmentConfig {
        CommitmentConfig {
            commitment: self.commitment,
        }
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build from `FLASH_LOAN_*` environment variables over the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(program_id) = lookup(ENV_PROGRAM_ID) {
            config.program_id = parse_pubkey(ENV_PROGRAM_ID, &program_id)?;
        }

        let referral = lookup(ENV_REFERRAL_TOKEN);
        let fixed = lookup(ENV_FIXED_RECIPIENT);
        config.fee_recipient = match (referral, fixed) {
            (Some(_), Some(_)) => {
                return Err(ClientError::Config(format!(
                    "{} and {} are mutually exclusive",
                    ENV_REFERRAL_TOKEN, ENV_FIXED_RECIPIENT
                )))
            }
            (Some(referral), None) => {
                FeeRecipient::Referral(parse_pubkey(ENV_REFERRAL_TOKEN, &referral)?)
            }
            (None, Some(fixed)) => {
                FeeRecipient::FixedRecipient(parse_pubkey(ENV_FIXED_RECIPIENT, &fixed)?)
            }
            (None, None) => FeeRecipient::None,
        };

        if let Some(commitment) = lookup(ENV_COMMITMENT) {
            config.commitment = CommitmentLevel::from_str(&commitment).map_err(|_| {
                ClientError::Config(format!("{}: unknown commitment '{}'", ENV_COMMITMENT, commitment))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.fee_schedule.validate()
    }
}

fn parse_pubkey(key: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim())
        .map_err(|_| ClientError::Config(format!("{}: '{}' is not a valid address", key, value)))
}

/// Serialize pubkeys as base58 strings
pub(crate) mod pubkey_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(pubkey: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&pubkey.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let value = String::deserialize(deserializer)?;
        Pubkey::from_str(&value).map_err(D::Error::custom)
    }
}
