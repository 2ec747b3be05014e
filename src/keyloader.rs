use anyhow::{bail, Context, Result};
use solana_sdk::signature::Keypair;

/// Длина сериализованного `Keypair`: 32 байта секрета + 32 байта публичного ключа.
const KEYPAIR_LEN: usize = 64;

/// Декодирует приватный ключ кошелька из строки `PRIVATE_KEY`.
///
/// Основной формат — base58 (как экспортирует Phantom/Solflare).
/// Также принимается JSON-массив байтов из файла `solana-keygen`, например `[12,34,...]`.
///
/// # Возвращает:
/// - `Ok(Keypair)` — при успешной декодировке
/// - `Err` — если строка невалидная или длина не 64 байта
pub fn read_keypair_from_base58_string(key_str: &str) -> Result<Keypair> {
    let key_str = key_str.trim();

    let data = if key_str.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(key_str).context("Невозможно разобрать JSON-массив ключа")?
    } else {
        bs58::decode(key_str)
            .into_vec()
            .context("Невозможно декодировать base58 строку")?
    };

    if data.len() != KEYPAIR_LEN {
        bail!("Невалидная длина ключа: {} байт, ожидается {}", data.len(), KEYPAIR_LEN);
    }

    let keypair = Keypair::from_bytes(data.as_slice()).context("Невалидный формат ключа")?;
    Ok(keypair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Signer;

    #[test]
    fn decodes_base58_secret() {
        let original = Keypair::new();
        let encoded = original.to_base58_string();

        let decoded = read_keypair_from_base58_string(&encoded).unwrap();
        assert_eq!(decoded.pubkey(), original.pubkey());
    }

    #[test]
    fn decodes_json_byte_array() {
        let original = Keypair::new();
        let json = serde_json::to_string(&original.to_bytes().to_vec()).unwrap();

        let decoded = read_keypair_from_base58_string(&json).unwrap();
        assert_eq!(decoded.pubkey(), original.pubkey());
    }

    #[test]
    fn rejects_garbage() {
        assert!(read_keypair_from_base58_string("not-base58-0OIl").is_err());
        assert!(read_keypair_from_base58_string("").is_err());
        // валидный base58, но 32 байта
        let short = bs58::encode([7u8; 32]).into_string();
        assert!(read_keypair_from_base58_string(&short).is_err());
    }
}
