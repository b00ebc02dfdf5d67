//! Fungible token transfer events.
use alloy::sol;
use alloy_sol_types::SolEvent;
use primitives::{ChainAddress, Log, TransferEvent};

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

/// Decode an ERC-20 `Transfer` log.
///
/// ERC-721 transfers share the signature but index the token id as a fourth
/// topic; those are ignored.
pub fn decode_transfer(log: &Log) -> Option<TransferEvent> {
    if log.topics.len() != 3 || log.topics[0] != IERC20::Transfer::SIGNATURE_HASH {
        return None;
    }
    let event = IERC20::Transfer::decode_raw_log(log.topics.iter().copied(), &log.data).ok()?;
    Some(TransferEvent {
        from: event.from.into(),
        to: event.to.into(),
        contract: ChainAddress::from(log.address),
        raw_amount: event.value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, U256};

    fn transfer_log(token: Address, from: Address, to: Address, amount: u64) -> Log {
        let encoded = IERC20::Transfer { from, to, value: U256::from(amount) }.encode_log_data();
        Log {
            address: token,
            topics: encoded.topics().to_vec(),
            data: encoded.data,
            ..Default::default()
        }
    }

    #[test]
    fn decodes_erc20_transfer() {
        let token = Address::repeat_byte(0xaa);
        let log = transfer_log(token, Address::repeat_byte(1), Address::repeat_byte(2), 500);

        let transfer = decode_transfer(&log).unwrap();
        assert_eq!(transfer.contract, ChainAddress::from(token));
        assert_eq!(transfer.from, ChainAddress::from(Address::repeat_byte(1)));
        assert_eq!(transfer.raw_amount, U256::from(500));
    }

    #[test]
    fn ignores_nft_transfers_and_other_events() {
        let token = Address::repeat_byte(0xaa);
        let mut nft = transfer_log(token, Address::repeat_byte(1), Address::repeat_byte(2), 7);
        nft.topics.push(B256::repeat_byte(7));
        nft.data = Default::default();
        assert!(decode_transfer(&nft).is_none());

        let mut other = transfer_log(token, Address::repeat_byte(1), Address::repeat_byte(2), 7);
        other.topics[0] = B256::repeat_byte(9);
        assert!(decode_transfer(&other).is_none());
    }
}
