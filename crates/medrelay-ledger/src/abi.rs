//! Contract ABI codec
//!
//! Only the three consent contract functions are supported, so the encoder
//! handles `string` and `uint256` arguments and the decoder handles `bool`
//! and `uint256` words. Consent ids are assumed to fit in 64 bits.

use medrelay_core::LedgerConsentId;

/// Size of one ABI word
pub const WORD: usize = 32;

/// `createConsent(string,string,string)`
pub const CREATE_CONSENT: [u8; 4] = [0xf2, 0x29, 0x81, 0x3f];
/// `signConsent(uint256)`
pub const SIGN_CONSENT: [u8; 4] = [0x1d, 0xe3, 0xf1, 0x86];
/// `getConsentStatus(uint256)`
pub const GET_CONSENT_STATUS: [u8; 4] = [0xa5, 0x0e, 0x32, 0x73];

/// Decoding failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("expected at least {expected} bytes, got {actual}")]
    Short { expected: usize, actual: usize },
    #[error("value does not fit in 64 bits")]
    Overflow,
}

/// Calldata for `createConsent(patientId, procedureType, description)`
pub fn encode_create_consent(patient_id: &str, procedure_type: &str, description: &str) -> Vec<u8> {
    let args = [patient_id, procedure_type, description];

    let mut head = Vec::with_capacity(args.len() * WORD);
    let mut tail = Vec::new();
    for arg in args {
        head.extend_from_slice(&uint_word((args.len() * WORD + tail.len()) as u64));
        encode_string(arg, &mut tail);
    }

    let mut data = CREATE_CONSENT.to_vec();
    data.extend_from_slice(&head);
    data.extend_from_slice(&tail);
    data
}

/// Calldata for `signConsent(consentId)`
pub fn encode_sign_consent(consent_id: LedgerConsentId) -> Vec<u8> {
    encode_uint_call(SIGN_CONSENT, consent_id.0)
}

/// Calldata for `getConsentStatus(consentId)`
pub fn encode_get_consent_status(consent_id: LedgerConsentId) -> Vec<u8> {
    encode_uint_call(GET_CONSENT_STATUS, consent_id.0)
}

fn encode_uint_call(selector: [u8; 4], value: u64) -> Vec<u8> {
    let mut data = selector.to_vec();
    data.extend_from_slice(&uint_word(value));
    data
}

fn encode_string(value: &str, out: &mut Vec<u8>) {
    let bytes = value.as_bytes();
    out.extend_from_slice(&uint_word(bytes.len() as u64));
    out.extend_from_slice(bytes);
    let padding = (WORD - bytes.len() % WORD) % WORD;
    out.extend(std::iter::repeat(0u8).take(padding));
}

/// Big-endian uint256 word holding `value`
pub fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// `0x`-prefixed lowercase hex
pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decode `0x`-prefixed (or bare) hex
pub fn from_hex(value: &str) -> Result<Vec<u8>, AbiError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| AbiError::Hex(e.to_string()))
}

/// Read the first word as an unsigned integer
pub fn decode_u64(data: &[u8]) -> Result<u64, AbiError> {
    if data.len() < WORD {
        return Err(AbiError::Short {
            expected: WORD,
            actual: data.len(),
        });
    }
    let word = &data[..WORD];
    if word[..WORD - 8].iter().any(|byte| *byte != 0) {
        return Err(AbiError::Overflow);
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(low))
}

/// Read the first word as a boolean
pub fn decode_bool(data: &[u8]) -> Result<bool, AbiError> {
    decode_u64(data).map(|value| value != 0)
}
