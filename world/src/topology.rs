//! Single-line transfer format for grid floor heights.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tilegrid_core::{Coord, GridError};

use crate::{Config, Grid};

const TOPOLOGY_DOMAIN: &str = "tilegrid-topology";
const TOPOLOGY_VERSION: &str = "v1";
const FIELD_DELIMITER: char = ':';

/// Floor heights of every cell in row-major order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// One height per cell, row-major, starting at `(1, 1)`.
    pub heights: Vec<i16>,
}

impl Topology {
    /// Encodes the topology as `tilegrid-topology:v1:<w>x<h>:<payload>`.
    pub fn encode(&self) -> Result<String, TopologyError> {
        self.check_len()?;
        let bytes = bincode::serialize(&self.heights).map_err(TopologyError::Serialization)?;
        let encoded = STANDARD_NO_PAD.encode(bytes);
        Ok(format!(
            "{TOPOLOGY_DOMAIN}{FIELD_DELIMITER}{TOPOLOGY_VERSION}{FIELD_DELIMITER}{}x{}{FIELD_DELIMITER}{encoded}",
            self.width, self.height
        ))
    }

    /// Decodes a topology produced by [`Topology::encode`].
    pub fn decode(value: &str) -> Result<Self, TopologyError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TopologyError::EmptyPayload);
        }

        let segments: Vec<&str> = trimmed.splitn(4, FIELD_DELIMITER).collect();
        let &[domain, version, dimensions, payload] = segments.as_slice() else {
            return Err(match segments.len() {
                1 => TopologyError::MissingVersion,
                2 => TopologyError::MissingDimensions,
                _ => TopologyError::MissingPayload,
            });
        };

        match (domain, version) {
            (TOPOLOGY_DOMAIN, TOPOLOGY_VERSION) => {}
            (TOPOLOGY_DOMAIN, other) => {
                return Err(TopologyError::UnsupportedVersion(other.to_owned()))
            }
            (other, _) => return Err(TopologyError::InvalidPrefix(other.to_owned())),
        }

        let (width, height) = parse_dimensions(dimensions)?;
        let heights: Vec<i16> = STANDARD_NO_PAD
            .decode(payload)
            .map_err(TopologyError::InvalidEncoding)
            .and_then(|bytes| {
                bincode::deserialize(&bytes).map_err(TopologyError::Serialization)
            })?;

        let topology = Self {
            width,
            height,
            heights,
        };
        topology.check_len()?;
        Ok(topology)
    }

    fn check_len(&self) -> Result<(), TopologyError> {
        let expected = u64::from(self.width) * u64::from(self.height);
        let actual = self.heights.len() as u64;
        if expected != actual {
            return Err(TopologyError::LengthMismatch { expected, actual });
        }
        Ok(())
    }
}

/// Errors raised while encoding, decoding or applying a topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The string was empty or whitespace.
    #[error("topology string was empty")]
    EmptyPayload,
    /// The version segment was missing.
    #[error("topology string is missing the version")]
    MissingVersion,
    /// The dimension segment was missing.
    #[error("topology string is missing the grid dimensions")]
    MissingDimensions,
    /// The payload segment was missing.
    #[error("topology string is missing the payload")]
    MissingPayload,
    /// The prefix names another format.
    #[error("topology prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The version is not understood.
    #[error("topology version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The dimensions could not be parsed or were zero.
    #[error("could not parse grid dimensions '{0}'")]
    InvalidDimensions(String),
    /// The payload is not valid base64.
    #[error("could not decode topology payload: {0}")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The payload is not a valid height list.
    #[error("could not (de)serialise topology heights: {0}")]
    Serialization(#[source] bincode::Error),
    /// The number of heights disagrees with the dimensions.
    #[error("expected {expected} heights but found {actual}")]
    LengthMismatch {
        /// Cells implied by the dimensions.
        expected: u64,
        /// Heights actually present.
        actual: u64,
    },
    /// The grid refused the topology.
    #[error(transparent)]
    Grid(#[from] GridError),
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), TopologyError> {
    let invalid = || TopologyError::InvalidDimensions(dimensions.to_owned());
    let (width, height) = dimensions.split_once(['x', 'X']).ok_or_else(invalid)?;
    let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
    let height = height.trim().parse::<u32>().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

impl Grid {
    /// Captures the floor heights of every cell.
    #[must_use]
    pub fn topology(&self) -> Topology {
        Topology {
            width: self.width,
            height: self.height,
            heights: self.cells.iter().map(|cell| cell.height()).collect(),
        }
    }

    /// Builds an empty grid whose cells carry the provided heights.
    pub fn from_topology(topology: &Topology, config: Config) -> Result<Self, TopologyError> {
        topology.check_len()?;
        let mut grid = Self::new(topology.width, topology.height, config)?;
        let coords: Vec<Coord> = grid.bounds().iter().collect();
        for (coord, &height) in coords.into_iter().zip(&topology.heights) {
            grid.set_height(coord, height)?;
        }
        Ok(grid)
    }
}
