#[allow(clippy::too_many_arguments)]
pub mod exchange {
    alloy::sol!(
        /// Exchange core contract: the withdrawal and account surface used by
        /// the settlement flow.
        #[derive(Debug)]
        #[sol(rpc)]
        interface Exchange {
            struct GasFee {
                uint32 gasPerAction;
                address feeToken;
                uint256 maxGasPrice;
                uint256 conversionRateBase;
                uint256 conversionRateQuote;
            }

            struct Withdraw {
                address maker;
                address token;
                uint256 amount;
                uint256 salt;
                GasFee gasFee;
                address receiver;
                uint8 signScheme;
            }

            function requestOnchainWithdraw(Withdraw calldata withdraw) external;

            function applyOnchainWithdraw(bytes32 key) external;

            function getPendingWithdraw(address account, address token) external view returns (bytes32);

            function balanceOf(address account, address token) external view returns (uint256);

            function nonce(address account) external view returns (uint256);

            function getSigner(address account) external view returns (address);

            function bindToSigner(address signer) external;
        }
    );
}
