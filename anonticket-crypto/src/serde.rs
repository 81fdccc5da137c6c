//! Serde support for `bls12_381` types.
//!
//! The curve crate ships no `Serialize`/`Deserialize` implementations, so every struct that stores
//! points or scalars goes through [`SerializeElement`] with the `#[serde(with =
//! "SerializeElement")]` attribute. Points use the compressed encoding and are rejected on decode
//! unless they lie in the prime-order subgroup; scalars use their canonical little-endian bytes
//! and are rejected when not reduced.

use crate::common::*;
use serde::{
    de::{self, SeqAccess, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::marker::PhantomData;

#[derive(Serialize)]
#[serde(transparent)]
struct SerWrapper<'a, G: SerializeElement>(
    #[serde(serialize_with = "<G as SerializeElement>::serialize")] &'a G,
);

#[derive(Deserialize)]
#[serde(transparent)]
struct DeWrapper<G: SerializeElement>(#[serde(with = "SerializeElement")] G);

/// Serialization/deserialization functionality for external `bls12_381` types and containers of
/// them.
pub trait SerializeElement: Sized {
    /// Proxy serialization function telling serde how to serialize the implementing type.
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer;

    /// Proxy deserialization function telling serde how to deserialize the implementing type.
    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>;
}

impl SerializeElement for G1Affine {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_big_array::BigArray::serialize(&this.to_compressed(), serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let maybe_point: Option<G1Affine> =
            G1Affine::from_compressed(&serde_big_array::BigArray::deserialize(deserializer)?)
                .into();
        maybe_point.ok_or_else(|| de::Error::custom("invalid G1 encoding"))
    }
}

impl SerializeElement for G1Projective {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        G1Affine::serialize(&this.into(), serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        G1Affine::deserialize(deserializer).map(Into::into)
    }
}

impl SerializeElement for G2Affine {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_big_array::BigArray::serialize(&this.to_compressed(), serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let maybe_point: Option<G2Affine> =
            G2Affine::from_compressed(&serde_big_array::BigArray::deserialize(deserializer)?)
                .into();
        maybe_point.ok_or_else(|| de::Error::custom("invalid G2 encoding"))
    }
}

impl SerializeElement for Scalar {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        this.to_bytes().serialize(serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = <[u8; 32]>::deserialize(deserializer)?;
        let maybe_scalar: Option<Scalar> = Scalar::from_bytes(&bytes).into();
        maybe_scalar.ok_or_else(|| de::Error::custom("invalid scalar encoding"))
    }
}

impl<G: SerializeElement> SerializeElement for Option<G> {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        this.as_ref().map(SerWrapper).serialize(serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<DeWrapper<G>>::deserialize(deserializer)?.map(|wrapped| wrapped.0))
    }
}

impl<G: SerializeElement> SerializeElement for Vec<G> {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(this.len()))?;
        for g in this {
            seq.serialize_element(&SerWrapper(g))?;
        }
        seq.end()
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ElementVisitor<G> {
            _phantom: PhantomData<G>,
        }

        impl<'de, G> Visitor<'de> for ElementVisitor<G>
        where
            G: SerializeElement,
        {
            type Value = Vec<G>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a sequence of group elements or scalars")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut elems = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(elem) = seq.next_element::<DeWrapper<G>>()? {
                    elems.push(elem.0);
                }
                Ok(elems)
            }
        }

        deserializer.deserialize_seq(ElementVisitor {
            _phantom: PhantomData,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ff::Field;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Bundle {
        #[serde(with = "SerializeElement")]
        point: G1Affine,
        #[serde(with = "SerializeElement")]
        maybe: Option<G2Affine>,
        #[serde(with = "SerializeElement")]
        scalars: Vec<Scalar>,
    }

    #[test]
    fn elements_survive_bincode() {
        let mut rng = rand::thread_rng();
        let bundle = Bundle {
            point: G1Projective::random(&mut rng).into(),
            maybe: Some(G2Projective::random(&mut rng).into()),
            scalars: vec![Scalar::random(&mut rng), Scalar::zero()],
        };
        let bytes = bincode::serialize(&bundle).unwrap();
        assert_eq!(bincode::deserialize::<Bundle>(&bytes).unwrap(), bundle);
    }

    #[test]
    fn unreduced_scalar_is_rejected() {
        let bytes = bincode::serialize(&[0xffu8; 32]).unwrap();
        assert!(bincode::deserialize::<DeWrapper<Scalar>>(&bytes).is_err());
    }
}
