//! Reference roster of eligible attendees.
//!
//! Loaded once per run from the Reference directory and read-only after
//! that. The file goes through the same encoding resolver as statements.

use crate::encoding::decode_bytes;
use crate::error::{Result, SaisonError};
use crate::models::Attendee;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Loaded roster with id lookup
#[derive(Debug, Clone, Default)]
pub struct Roster {
    attendees: Vec<Attendee>,
    index: HashMap<String, usize>,
}

impl Roster {
    /// Build a roster, rejecting blank or duplicate ids
    pub fn new(attendees: Vec<Attendee>) -> std::result::Result<Self, String> {
        let mut index = HashMap::with_capacity(attendees.len());
        for (position, attendee) in attendees.iter().enumerate() {
            if attendee.id.is_empty() {
                return Err(format!("entry {} has a blank id", position + 1));
            }
            if index.insert(attendee.id.clone(), position).is_some() {
                return Err(format!("duplicate id '{}'", attendee.id));
            }
        }
        Ok(Self { attendees, index })
    }

    /// Load the roster CSV (columns id, name, title, company)
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| SaisonError::io(path, e))?;
        let decoded = decode_bytes(&bytes, path)?;
        debug!(
            "Roster {} decoded as {}",
            path.display(),
            decoded.codec.label()
        );

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(decoded.text.as_bytes());

        let mut attendees = Vec::new();
        for record in reader.deserialize::<Attendee>() {
            attendees.push(record.map_err(|e| SaisonError::csv(path, e))?);
        }

        let roster = Self::new(attendees).map_err(|reason| SaisonError::Roster {
            path: path.to_path_buf(),
            reason,
        })?;
        info!("Loaded {} attendees from {}", roster.len(), path.display());
        Ok(roster)
    }

    pub fn len(&self) -> usize {
        self.attendees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attendees.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Attendee> {
        self.index.get(id).map(|&i| &self.attendees[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.attendees.iter().map(|a| a.id.as_str())
    }

    pub fn attendees(&self) -> &[Attendee] {
        &self.attendees
    }
}

/// Numeric ordering for ids; non-numeric ids sort last, then lexically
pub fn numeric_id_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
