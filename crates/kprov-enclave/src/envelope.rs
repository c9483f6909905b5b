//! # Provisioning Envelope
//!
//! The single payload of the retrieve-key call. Both credentials travel in
//! one length-prefixed structure instead of positional buffer/length pairs:
//!
//! ```text
//! magic   "KPV1"            4 bytes
//! count   u16 big-endian    number of fields
//! field*  tag u8 | len u32 big-endian | len bytes
//! ```
//!
//! Tags are [`PayloadKind::tag`] values. Nothing is NUL-terminated. The
//! parser rejects unknown tags, duplicate fields, missing fields, short
//! reads and trailing bytes.

use zeroize::Zeroizing;

use kprov_core::PayloadKind;

use crate::error::EnvelopeError;

/// Leading magic of every envelope.
pub const MAGIC: [u8; 4] = *b"KPV1";

const FIELD_HEADER_LEN: usize = 1 + 4;

/// Borrowed view of the two credential fields.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProvisioningEnvelope<'a> {
    /// PKCS#8 DER of the client private key.
    pub private_key: &'a [u8],
    /// DER of the server certificate.
    pub certificate: &'a [u8],
}

impl<'a> ProvisioningEnvelope<'a> {
    /// Serialize. The result holds key material and is zeroized on drop.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
        let fields = [
            (PayloadKind::PrivateKey, self.private_key),
            (PayloadKind::Certificate, self.certificate),
        ];
        let body: usize = fields.iter().map(|(_, b)| FIELD_HEADER_LEN + b.len()).sum();
        let mut out = Zeroizing::new(Vec::with_capacity(MAGIC.len() + 2 + body));
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&(fields.len() as u16).to_be_bytes());
        for (kind, bytes) in fields {
            let len = u32::try_from(bytes.len()).map_err(|_| EnvelopeError::FieldTooLarge {
                kind,
                len: bytes.len(),
            })?;
            out.push(kind.tag());
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(bytes);
        }
        Ok(out)
    }

    /// Strict parse. Borrowed slices point into `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, EnvelopeError> {
        let mut cursor = Cursor { rest: bytes };
        if cursor.take(MAGIC.len())? != MAGIC {
            return Err(EnvelopeError::BadMagic);
        }
        let count = u16::from_be_bytes(cursor.array()?);

        let mut private_key = None;
        let mut certificate = None;
        for _ in 0..count {
            let [tag] = cursor.array::<1>()?;
            let kind = PayloadKind::from_tag(tag).ok_or(EnvelopeError::UnknownTag(tag))?;
            let len = u32::from_be_bytes(cursor.array()?) as usize;
            let value = cursor.take(len)?;
            let slot = match kind {
                PayloadKind::PrivateKey => &mut private_key,
                PayloadKind::Certificate => &mut certificate,
            };
            if slot.replace(value).is_some() {
                return Err(EnvelopeError::DuplicateField(kind));
            }
        }
        if !cursor.rest.is_empty() {
            return Err(EnvelopeError::TrailingBytes(cursor.rest.len()));
        }

        Ok(Self {
            private_key: private_key.ok_or(EnvelopeError::MissingField(PayloadKind::PrivateKey))?,
            certificate: certificate.ok_or(EnvelopeError::MissingField(PayloadKind::Certificate))?,
        })
    }
}

impl std::fmt::Debug for ProvisioningEnvelope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningEnvelope")
            .field("private_key_len", &self.private_key.len())
            .field("certificate_len", &self.certificate.len())
            .finish()
    }
}

struct Cursor<'a> {
    rest: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], EnvelopeError> {
        if self.rest.len() < n {
            return Err(EnvelopeError::Truncated {
                needed: n,
                available: self.rest.len(),
            });
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], EnvelopeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}
