//! Provider and configuration records
//!
//! Typed views over the two record kinds in the durable store, plus the
//! statements that read and write them. Everything here goes through a
//! [`StoreGateway`]; nothing holds a connection.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::traits::{Row, StoreGateway, Value};

/// Name of the flag that enables the loopback TCP listener
pub const RUN_NETWORK_LISTENER: &str = "RUN_REST_SERVER";

/// Value of [`RUN_NETWORK_LISTENER`] that means "enabled"
pub const AFFIRMATIVE: &str = "YES";

const SELECT_ALL: &str = "SELECT ID, NAME, ADDRESS, SELECTED FROM PROVIDERS;";
const SELECT_SELECTED: &str = "SELECT ID, NAME, ADDRESS, SELECTED FROM PROVIDERS WHERE SELECTED = 1;";
const INSERT_PROVIDER: &str = "INSERT INTO PROVIDERS(ID, NAME, ADDRESS) VALUES(?1, ?2, ?3);";
const SELECT_CONFIG: &str = "SELECT NAME, VALUE FROM CONFIG WHERE NAME = ?1;";

/// A DDNS provider as stored and as served to the companion application
///
/// The wire form keeps the field names the companion reads:
///
/// ```json
/// {"UUID": "…", "NAME": "ns1", "URL": "1.2.3.4", "SELECTED": 0}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Service-generated identifier
    #[serde(rename = "UUID")]
    pub id: String,

    /// Display name
    #[serde(rename = "NAME")]
    pub name: String,

    /// Provider address; opaque to the service
    #[serde(rename = "URL")]
    pub address: String,

    /// Selection flag, `0`/`1` on the wire
    #[serde(
        rename = "SELECTED",
        serialize_with = "flag_as_int",
        deserialize_with = "flag_from_int"
    )]
    pub selected: bool,
}

impl ProviderRecord {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.text(0)?,
            name: row.text(1)?,
            address: row.text(2)?,
            selected: row.flag(3)?,
        })
    }
}

fn flag_as_int<S: Serializer>(flag: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

fn flag_from_int<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(u8::deserialize(deserializer)? != 0)
}

/// A validated, not yet persisted provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProvider {
    id: String,
    name: String,
    address: String,
}

impl NewProvider {
    /// Validate caller input and assign a fresh identifier
    ///
    /// # Errors
    ///
    /// `Error::Validation` if `name` or `address` is empty.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let address = address.into();

        if name.is_empty() {
            return Err(Error::validation("provider name must not be empty"));
        }
        if address.is_empty() {
            return Err(Error::validation("provider address must not be empty"));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            address,
        })
    }

    /// Identifier that will be stored
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Insert into the store, returning the stored record
    pub async fn insert(self, store: &dyn StoreGateway) -> Result<ProviderRecord> {
        let affected = store
            .execute(
                INSERT_PROVIDER,
                vec![
                    Value::Text(self.id.clone()),
                    Value::Text(self.name.clone()),
                    Value::Text(self.address.clone()),
                ],
            )
            .await?;
        tracing::info!(provider_id = %self.id, "Rows affected: {}", affected);

        Ok(ProviderRecord {
            id: self.id,
            name: self.name,
            address: self.address,
            selected: false,
        })
    }
}

/// A named configuration value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFlag {
    /// Flag name
    #[serde(rename = "NAME")]
    pub name: String,

    /// Raw string value
    #[serde(rename = "VALUE")]
    pub value: String,
}

impl ConfigFlag {
    /// Whether the value is the affirmative sentinel
    pub fn is_affirmative(&self) -> bool {
        self.value == AFFIRMATIVE
    }
}

/// Load every provider in the store
pub async fn load_all(store: &dyn StoreGateway) -> Result<Vec<ProviderRecord>> {
    store
        .query(SELECT_ALL, Vec::new())
        .await?
        .iter()
        .map(ProviderRecord::from_row)
        .collect()
}

/// Load the provider(s) whose selection flag is set
///
/// Uniqueness of the flag is not enforced by the store, so this may return
/// zero, one or several records.
pub async fn load_selected(store: &dyn StoreGateway) -> Result<Vec<ProviderRecord>> {
    store
        .query(SELECT_SELECTED, Vec::new())
        .await?
        .iter()
        .map(ProviderRecord::from_row)
        .collect()
}

/// Read a configuration value by name; the first matching row wins
pub async fn config_value(store: &dyn StoreGateway, name: &str) -> Result<Option<ConfigFlag>> {
    let rows = store
        .query(SELECT_CONFIG, vec![Value::Text(name.to_string())])
        .await?;

    rows.first()
        .map(|row| {
            Ok(ConfigFlag {
                name: row.text(0)?,
                value: row.text(1)?,
            })
        })
        .transpose()
}

/// Whether the loopback TCP listener should be started
///
/// An absent flag or any value other than `YES` means no.
pub async fn run_network_listener(store: &dyn StoreGateway) -> Result<bool> {
    Ok(config_value(store, RUN_NETWORK_LISTENER)
        .await?
        .is_some_and(|flag| flag.is_affirmative()))
}
