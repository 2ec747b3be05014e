use raydium_swap::amm::fetch_pool_state;
use raydium_swap::pool::PoolKeys;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;

fn dummy_keys() -> PoolKeys {
    let key = Pubkey::new_unique;
    PoolKeys {
        id: key(),
        base_mint: key(),
        quote_mint: key(),
        lp_mint: key(),
        base_decimals: 6,
        quote_decimals: 9,
        version: 4,
        program_id: key(),
        authority: key(),
        open_orders: key(),
        target_orders: key(),
        base_vault: key(),
        quote_vault: key(),
        market_version: 4,
        market_program_id: key(),
        market_id: key(),
        market_authority: key(),
        market_base_vault: key(),
        market_quote_vault: key(),
        market_bids: key(),
        market_asks: key(),
        market_event_queue: key(),
    }
}

#[tokio::test]
async fn test_fetch_pool_state_invalid_rpc() {
    let rpc = RpcClient::new("https://invalid-rpc.test".to_string());

    let result = fetch_pool_state(&rpc, &dummy_keys()).await;

    assert!(result.is_err(), "Ожидалась ошибка при чтении пула через невалидный RPC");
}
