//! NIP-19 bech32 entities: keys, note ids and `naddr` pointers.
//!
//! Shareable identifiers are bech32 strings whose human readable part names
//! the entity. Plain entities (`nsec`, `npub`, `note`) carry 32 raw bytes;
//! `naddr` carries a TLV stream:
//!
//! | type | meaning | value |
//! |------|---------|-------|
//! | `0`  | identifier (`d` tag) | UTF-8 bytes |
//! | `1`  | relay hint, repeatable | UTF-8 bytes |
//! | `2`  | author | 32-byte public key |
//! | `3`  | kind | big-endian `u32` |

use bech32::{primitives::decode::CheckedHrpstring, Checksum, Hrp};
use secp256k1::XOnlyPublicKey;
use thiserror::Error;

static HRP_NSEC: Hrp = Hrp::parse_unchecked("nsec");
static HRP_NPUB: Hrp = Hrp::parse_unchecked("npub");
static HRP_NOTE: Hrp = Hrp::parse_unchecked("note");
static HRP_NADDR: Hrp = Hrp::parse_unchecked("naddr");

/// The bech32 checksum without its 1023 character code length. An `naddr`
/// carrying many relay hints runs past that limit.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum NostrBech32 {}

impl Checksum for NostrBech32 {
    type MidstateRepr = u32;
    const CODE_LENGTH: usize = usize::MAX;
    const CHECKSUM_LENGTH: usize = 6;
    const GENERATOR_SH: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];
    const TARGET_RESIDUE: u32 = 1;
}

const TLV_SPECIAL: u8 = 0;
const TLV_RELAY: u8 = 1;
const TLV_AUTHOR: u8 = 2;
const TLV_KIND: u8 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Nip19Error {
    #[error("invalid bech32: {0}")]
    Bech32(String),

    #[error("unsupported prefix `{0}`")]
    UnsupportedPrefix(String),

    #[error("invalid byte size")]
    InvalidByteSize,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("tlv value too long ({0} bytes)")]
    ValueTooLong(usize),

    #[error("malformed tlv data")]
    MalformedTlv,

    #[error("missing {0}")]
    MissingField(&'static str),
}

/// A decoded bech32 entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    SecretKey([u8; 32]),
    PublicKey([u8; 32]),
    Note([u8; 32]),
    Address(AddressPointer),
}

/// Pointer to an addressable event: author + kind + `d` identifier, with
/// relay hints telling readers where to look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPointer {
    pub pubkey: [u8; 32],
    pub kind: u32,
    pub identifier: String,
    pub relays: Vec<String>,
}

impl AddressPointer {
    /// Encode as an `naddr1…` string.
    pub fn encode(&self) -> Result<String, Nip19Error> {
        let mut buf = Vec::new();
        write_tlv(&mut buf, TLV_SPECIAL, self.identifier.as_bytes())?;
        for relay in &self.relays {
            write_tlv(&mut buf, TLV_RELAY, relay.as_bytes())?;
        }
        write_tlv(&mut buf, TLV_AUTHOR, &self.pubkey)?;
        write_tlv(&mut buf, TLV_KIND, &self.kind.to_be_bytes())?;
        encode_bytes(HRP_NADDR, &buf)
    }

    fn from_tlv(data: &[u8]) -> Result<Self, Nip19Error> {
        let mut identifier = None;
        let mut pubkey = None;
        let mut kind = None;
        let mut relays = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let (ty, len) = match rest {
                [ty, len, ..] => (*ty, *len as usize),
                _ => return Err(Nip19Error::MalformedTlv),
            };
            let value = rest.get(2..2 + len).ok_or(Nip19Error::MalformedTlv)?;
            match ty {
                TLV_SPECIAL => identifier = Some(utf8(value)?),
                TLV_RELAY => relays.push(utf8(value)?),
                TLV_AUTHOR => pubkey = Some(to_array(value)?),
                TLV_KIND => {
                    let bytes: [u8; 4] =
                        value.try_into().map_err(|_| Nip19Error::InvalidByteSize)?;
                    kind = Some(u32::from_be_bytes(bytes));
                }
                // unknown entries are skipped
                _ => {}
            }
            rest = &rest[2 + len..];
        }
        Ok(Self {
            pubkey: pubkey.ok_or(Nip19Error::MissingField("author"))?,
            kind: kind.ok_or(Nip19Error::MissingField("kind"))?,
            identifier: identifier.ok_or(Nip19Error::MissingField("identifier"))?,
            relays,
        })
    }
}

/// Build the `naddr` for an addressable event from the hex public key the
/// event was signed with.
pub fn encode_address(
    pubkey_hex: &str,
    kind: u32,
    identifier: &str,
    relays: &[String],
) -> Result<String, Nip19Error> {
    let bytes = hex::decode(pubkey_hex).map_err(|_| Nip19Error::InvalidPublicKey)?;
    XOnlyPublicKey::from_slice(&bytes).map_err(|_| Nip19Error::InvalidPublicKey)?;
    AddressPointer {
        pubkey: to_array(&bytes)?,
        kind,
        identifier: identifier.to_string(),
        relays: relays.to_vec(),
    }
    .encode()
}

pub fn encode_secret(secret: &[u8; 32]) -> Result<String, Nip19Error> {
    encode_bytes(HRP_NSEC, secret)
}

pub fn encode_public(pubkey: &[u8; 32]) -> Result<String, Nip19Error> {
    encode_bytes(HRP_NPUB, pubkey)
}

pub fn encode_note(id: &[u8; 32]) -> Result<String, Nip19Error> {
    encode_bytes(HRP_NOTE, id)
}

/// Decode any supported bech32 entity.
pub fn decode(s: &str) -> Result<Entity, Nip19Error> {
    let checked = CheckedHrpstring::new::<NostrBech32>(s)
        .map_err(|e| Nip19Error::Bech32(e.to_string()))?;
    let hrp = checked.hrp();
    let data: Vec<u8> = checked.byte_iter().collect();
    if hrp == HRP_NSEC {
        Ok(Entity::SecretKey(to_array(&data)?))
    } else if hrp == HRP_NPUB {
        Ok(Entity::PublicKey(to_array(&data)?))
    } else if hrp == HRP_NOTE {
        Ok(Entity::Note(to_array(&data)?))
    } else if hrp == HRP_NADDR {
        Ok(Entity::Address(AddressPointer::from_tlv(&data)?))
    } else {
        Err(Nip19Error::UnsupportedPrefix(hrp.to_string()))
    }
}

fn encode_bytes(hrp: Hrp, data: &[u8]) -> Result<String, Nip19Error> {
    bech32::encode::<NostrBech32>(hrp, data).map_err(|e| Nip19Error::Bech32(e.to_string()))
}

fn write_tlv(buf: &mut Vec<u8>, ty: u8, value: &[u8]) -> Result<(), Nip19Error> {
    let len = u8::try_from(value.len()).map_err(|_| Nip19Error::ValueTooLong(value.len()))?;
    buf.push(ty);
    buf.push(len);
    buf.extend_from_slice(value);
    Ok(())
}

fn to_array(data: &[u8]) -> Result<[u8; 32], Nip19Error> {
    data.try_into().map_err(|_| Nip19Error::InvalidByteSize)
}

fn utf8(data: &[u8]) -> Result<String, Nip19Error> {
    String::from_utf8(data.to_vec()).map_err(|_| Nip19Error::MalformedTlv)
}
