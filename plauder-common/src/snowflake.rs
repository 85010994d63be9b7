//! Timestamp-ordered unique ids in the spirit of snowflakes.
//!
//! Layout: 42 bits of milliseconds since the project epoch, 10 bits of
//! node id, 12 bits of per-node sequence. Sorting ids numerically sorts
//! them by creation time, with the sequence breaking ties within one
//! millisecond on one node.

use derive_where::derive_where;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_BITS: u32 = 42;
pub const NODE_ID_BITS: u32 = 10;
pub const SEQUENCE_BITS: u32 = 12;

pub const TIMESTAMP_SHIFT: u32 = NODE_ID_BITS + SEQUENCE_BITS;
pub const NODE_ID_SHIFT: u32 = SEQUENCE_BITS;

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimeError {
    #[error("Specified time was before the snowflake epoch.")]
    BeforeEpoch,
    #[error("Specified time does not fit into the timestamp bits.")]
    TooLarge,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Snowflake part was out of range for creation: {0}")]
pub struct SnowflakePartOutOfRangeError(u16);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
pub struct NodeId(u16);

impl NodeId {
    #[must_use]
    pub fn new(id: u16) -> Option<Self> {
        (id < 1 << NODE_ID_BITS).then_some(Self(id))
    }

    #[must_use]
    pub fn new_unchecked(id: u16) -> Self {
        Self::new(id).expect("NodeId out of range.")
    }

    #[must_use]
    pub fn random() -> Self {
        Self(rand::random_range(0..1u16 << NODE_ID_BITS))
    }

    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
pub struct Sequence(u16);

impl Sequence {
    #[must_use]
    pub fn new(sequence: u16) -> Option<Self> {
        (sequence < 1 << SEQUENCE_BITS).then_some(Self(sequence))
    }

    #[must_use]
    pub fn new_unchecked(sequence: u16) -> Self {
        Self::new(sequence).expect("Sequence out of range.")
    }

    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self((self.0 + 1) % (1 << SEQUENCE_BITS))
    }
}

impl TryFrom<u16> for NodeId {
    type Error = SnowflakePartOutOfRangeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(SnowflakePartOutOfRangeError(value))
    }
}

impl TryFrom<u16> for Sequence {
    type Error = SnowflakePartOutOfRangeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(SnowflakePartOutOfRangeError(value))
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = u16::deserialize(deserializer)?;
        Self::new(inner)
            .ok_or_else(|| Error::invalid_value(Unexpected::Unsigned(inner.into()), &"NodeId"))
    }
}

impl<'de> Deserialize<'de> for Sequence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = u16::deserialize(deserializer)?;
        Self::new(inner)
            .ok_or_else(|| Error::invalid_value(Unexpected::Unsigned(inner.into()), &"Sequence"))
    }
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    #[must_use]
    pub fn from_parts(timestamp_millis: u64, node_id: NodeId, sequence: Sequence) -> Self {
        let snowflake = timestamp_millis << TIMESTAMP_SHIFT
            | u64::from(node_id.get()) << NODE_ID_SHIFT
            | u64::from(sequence.get());

        Self::new(snowflake)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn timestamp_millis(self) -> u64 {
        self.0 >> TIMESTAMP_SHIFT
    }

    #[must_use]
    pub fn node_id(self) -> NodeId {
        #[allow(clippy::cast_possible_truncation)]
        NodeId((self.0 >> NODE_ID_SHIFT) as u16 & ((1 << NODE_ID_BITS) - 1))
    }

    #[must_use]
    pub fn sequence(self) -> Sequence {
        #[allow(clippy::cast_possible_truncation)]
        Sequence(self.0 as u16 & ((1 << SEQUENCE_BITS) - 1))
    }
}

impl<SnowflakeEpoch: Epoch> Snowflake<SnowflakeEpoch> {
    pub fn millis_since_epoch(time: UtcDateTime) -> Result<u64, SnowflakeTimeError> {
        let millis = (time - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
        if millis < 0 {
            return Err(SnowflakeTimeError::BeforeEpoch);
        }
        let millis_u64 = u64::try_from(millis).map_err(|_| SnowflakeTimeError::TooLarge)?;
        if millis_u64 >= 1 << TIMESTAMP_BITS {
            return Err(SnowflakeTimeError::TooLarge);
        }
        Ok(millis_u64)
    }

    pub fn try_from_time(
        time: UtcDateTime,
        node_id: NodeId,
        sequence: Sequence,
    ) -> Result<Self, SnowflakeTimeError> {
        let millis = Self::millis_since_epoch(time)?;
        Ok(Self::from_parts(millis, node_id, sequence))
    }

    #[must_use]
    pub fn timestamp(self) -> UtcDateTime {
        SnowflakeEpoch::EPOCH_TIME
            + Duration::milliseconds(
                self.timestamp_millis()
                    .try_into()
                    .expect("Timestamp exceeds Duration range"),
            )
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    node_id: NodeId,
    next_sequence: Sequence,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            next_sequence: Sequence::default(),
            phantom_data: PhantomData,
        }
    }

    #[must_use]
    pub fn node_id(self) -> NodeId {
        self.node_id
    }

    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        let sequence = self.next_sequence;
        self.next_sequence = sequence.next();

        Snowflake::try_from_time(time, self.node_id, sequence)
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        self.generate_at(UtcDateTime::now())
    }
}

#[cfg(test)]
mod tests {
    use crate::snowflake::{
        Epoch, NodeId, Sequence, Snowflake, SnowflakeGenerator, SnowflakeTimeError,
    };
    use time::{Duration, macros::utc_datetime};

    struct MillennialEpoch;
    impl Epoch for MillennialEpoch {
        const EPOCH_TIME: time::UtcDateTime = utc_datetime!(2000-01-01 00:00);
    }

    #[test]
    fn legal_part_values() {
        for legal_node in [0, 0x1FF, 0x3FF] {
            assert!(NodeId::new(legal_node).is_some());
        }
        for illegal_node in [0x400, 0xFFF, u16::MAX] {
            assert!(NodeId::new(illegal_node).is_none());
        }

        for legal_sequence in [0, 0xFF, 0xFFF] {
            assert!(Sequence::new(legal_sequence).is_some());
        }
        for illegal_sequence in [0x1000, 0xFF00, u16::MAX] {
            assert!(Sequence::new(illegal_sequence).is_none());
        }
    }

    #[test]
    fn sequence_wraps() {
        assert_eq!(Sequence::new_unchecked(0).next(), Sequence::new_unchecked(1));
        assert_eq!(
            Sequence::new_unchecked(0xFFF).next(),
            Sequence::new_unchecked(0)
        );
    }

    #[test]
    fn from_into_parts() {
        let node_id = NodeId::new_unchecked(0b10_1010_1010);
        let sequence = Sequence::new_unchecked(100);
        let snowflake =
            Snowflake::<MillennialEpoch>::from_parts(0xABCD_EF01, node_id, sequence);

        assert_eq!(snowflake.timestamp_millis(), 0xABCD_EF01);
        assert_eq!(snowflake.node_id(), node_id);
        assert_eq!(snowflake.sequence(), sequence);
    }

    #[test]
    fn timestamp_round_trip() {
        let time = utc_datetime!(2025-10-24 10:30);
        let snowflake = Snowflake::<MillennialEpoch>::try_from_time(
            time,
            NodeId::new_unchecked(1),
            Sequence::new_unchecked(0),
        )
        .unwrap();

        assert_eq!(snowflake.timestamp(), time);
    }

    #[test]
    fn time_before_epoch_is_rejected() {
        let result = Snowflake::<MillennialEpoch>::try_from_time(
            MillennialEpoch::EPOCH_TIME - Duration::milliseconds(1),
            NodeId::new_unchecked(0),
            Sequence::new_unchecked(0),
        );

        assert_eq!(result, Err(SnowflakeTimeError::BeforeEpoch));
    }

    #[test]
    fn ids_order_by_time_then_sequence() {
        let node_id = NodeId::new_unchecked(5);
        let time = utc_datetime!(2025-06-01 08:00);

        let mut generator = SnowflakeGenerator::<MillennialEpoch>::new(node_id);
        let first = generator.generate_at(time).unwrap();
        let second = generator.generate_at(time).unwrap();
        let later = generator
            .generate_at(time + Duration::milliseconds(1))
            .unwrap();

        assert!(first < second);
        assert!(second < later);
        assert_eq!(first.sequence(), Sequence::new_unchecked(0));
        assert_eq!(second.sequence(), Sequence::new_unchecked(1));
    }
}
