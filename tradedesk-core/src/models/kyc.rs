use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycDocumentType {
    Passport,
    NationalId,
    DriversLicense,
    ProofOfAddress,
}

impl fmt::Display for KycDocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KycDocumentType::Passport => "passport",
            KycDocumentType::NationalId => "national_id",
            KycDocumentType::DriversLicense => "drivers_license",
            KycDocumentType::ProofOfAddress => "proof_of_address",
        })
    }
}

impl FromStr for KycDocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "passport" => Ok(KycDocumentType::Passport),
            "national_id" => Ok(KycDocumentType::NationalId),
            "drivers_license" => Ok(KycDocumentType::DriversLicense),
            "proof_of_address" => Ok(KycDocumentType::ProofOfAddress),
            other => Err(format!("unknown document type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycDocument {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "super::string_or_number")]
    pub user_id: String,
    pub document_type: KycDocumentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    pub upload_date: DateTime<Utc>,
    pub status: KycStatus,
}
