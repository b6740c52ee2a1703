//! Game contract surface.
//!
//! Only the external functions the relay consumes are declared here: burner
//! registration, package deposits, the two tap entrypoints, and the read
//! getters. Contract internals are not modeled.

use alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};

sol! {
    #[sol(rpc)]
    interface IBasion {
        function registerBurner(address burner) external;
        function deposit(uint256 packageId, address referrer) external payable;
        function tap() external;
        function batchTap(uint256 count) external;
        function setBoost(address user, uint256 multiplier, uint256 bonusTaps) external;
        function userToBurner(address user) external view returns (address);
        function tapBalance(address user) external view returns (uint256);
        function pointsMultiplier(address user) external view returns (uint256);
    }
}

/// Calldata for `registerBurner(burner)`, sent by the main wallet.
pub fn register_burner_calldata(burner: Address) -> Bytes {
    IBasion::registerBurnerCall { burner }.abi_encode().into()
}

/// Calldata for `deposit(packageId, referrer)`, sent by the main wallet with
/// the package price attached as value. Pass `Address::ZERO` when the buyer
/// was not referred.
pub fn deposit_calldata(package_id: u8, referrer: Address) -> Bytes {
    IBasion::depositCall {
        packageId: U256::from(package_id),
        referrer,
    }
    .abi_encode()
    .into()
}

/// Calldata for `setBoost(user, multiplier, bonusTaps)`, sent by the contract
/// owner. The relay never grants bonus taps, so that argument is always zero.
pub fn set_boost_calldata(user: Address, multiplier: u64) -> Bytes {
    IBasion::setBoostCall {
        user,
        multiplier: U256::from(multiplier),
        bonusTaps: U256::ZERO,
    }
    .abi_encode()
    .into()
}

/// Calldata for a single `tap()`.
pub fn tap_calldata() -> Bytes {
    IBasion::tapCall {}.abi_encode().into()
}

/// Calldata for `batchTap(count)`.
pub fn batch_tap_calldata(count: u32) -> Bytes {
    IBasion::batchTapCall {
        count: U256::from(count),
    }
    .abi_encode()
    .into()
}
