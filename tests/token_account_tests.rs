use raydium_swap::token_account::get_owner_token_accounts;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::signature::{Keypair, Signer};

#[tokio::test]
async fn test_get_owner_token_accounts_invalid_rpc() {
    let rpc_client = RpcClient::new("https://invalid-rpc.test".to_string());
    let owner = Keypair::new();

    let result = get_owner_token_accounts(&rpc_client, &owner.pubkey()).await;

    assert!(result.is_err(), "Должна быть ошибка при невалидном RPC");
}
