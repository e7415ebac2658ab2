//! Known blockchain entity registry for address classification.
//!
//! Terminates funding-chain traces at known CEX hot wallets and bridge
//! contracts, and lets the risk scorer distinguish retail flow from
//! sophisticated on-chain routing.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    CexBinance,
    CexCoinbase,
    CexKraken,
    CexOkx,
    CexKucoin,
    CexBybit,
    CexCryptoCom,
    CexOther,
    BridgePolygon,
    BridgeMultichain,
    BridgeStargate,
    BridgeHop,
    BridgeOther,
    DexUniswap,
    DexSushiswap,
    DexQuickswap,
    Dex1inch,
    DexOther,
    TokenUsdc,
    TokenUsdt,
    TokenWeth,
    TokenWmatic,
    DefiAave,
    DefiCompound,
    DefiOther,
    Contract,
    Unknown,
}

impl EntityType {
    fn is_cex(self) -> bool {
        matches!(
            self,
            EntityType::CexBinance
                | EntityType::CexCoinbase
                | EntityType::CexKraken
                | EntityType::CexOkx
                | EntityType::CexKucoin
                | EntityType::CexBybit
                | EntityType::CexCryptoCom
                | EntityType::CexOther
        )
    }

    fn is_bridge(self) -> bool {
        matches!(
            self,
            EntityType::BridgePolygon
                | EntityType::BridgeMultichain
                | EntityType::BridgeStargate
                | EntityType::BridgeHop
                | EntityType::BridgeOther
        )
    }

    fn is_dex(self) -> bool {
        matches!(
            self,
            EntityType::DexUniswap
                | EntityType::DexSushiswap
                | EntityType::DexQuickswap
                | EntityType::Dex1inch
                | EntityType::DexOther
        )
    }

    fn is_terminal(self) -> bool {
        self.is_cex() || self.is_bridge()
    }
}

/// CEX hot wallet, bridge, DEX router, token, and DeFi protocol addresses on
/// Polygon. Sourced from Etherscan labels and public disclosures; not
/// exhaustive.
fn known_entities() -> HashMap<&'static str, EntityType> {
    let mut m = HashMap::new();
    // Binance
    m.insert("0x28c6c06298d514db089934071355e5743bf21d60", EntityType::CexBinance);
    m.insert("0x21a31ee1afc51d94c2efccaa2092ad1028285549", EntityType::CexBinance);
    m.insert("0xf89d7b9c864f589bbf53a82105107622b35eaa40", EntityType::CexBinance);
    m.insert("0xdfd5293d8e347dfe59e90efd55b2956a1343963d", EntityType::CexBinance);
    // Coinbase
    m.insert("0x503828976d22510aad0339f595f37cc4e4645c80", EntityType::CexCoinbase);
    m.insert("0x71660c4005ba85c37ccec55d0c4493e66fe775d3", EntityType::CexCoinbase);
    m.insert("0xa9d1e08c7793af67e9d92fe308d5697fb81d3e43", EntityType::CexCoinbase);
    // Kraken
    m.insert("0x2910543af39aba0cd09dbb2d50200b3e800a63d2", EntityType::CexKraken);
    m.insert("0x0a869d79a7052c7f1b55a8ebabbea3420f0d1e13", EntityType::CexKraken);
    // OKX
    m.insert("0x5041ed759dd4afc3a72b8192c143f72f4724081a", EntityType::CexOkx);
    m.insert("0x6cc5f688a315f3dc28a7781717a9a798a59fda7b", EntityType::CexOkx);
    // KuCoin
    m.insert("0xf16e9b0d03470827a95cdfd0cb8a8a3b46969b91", EntityType::CexKucoin);
    m.insert("0xd6216fc19db775df9774a6e33526131da7d19a2c", EntityType::CexKucoin);
    // Bybit
    m.insert("0xf89e6d82be28f5cc97a9e6a94a16a17e5be73e78", EntityType::CexBybit);
    // Crypto.com
    m.insert("0x6262998ced04146fa42253a5c0af90ca02dfd2a3", EntityType::CexCryptoCom);
    m.insert("0x46340b20830761efd32832a74d7169b29feb9758", EntityType::CexCryptoCom);
    // Polygon PoS bridge
    m.insert("0xa0c68c638235ee32657e8f720a23cec1bfc77c77", EntityType::BridgePolygon);
    m.insert("0x401f6c983ea34274ec46f84d70b31c151321188b", EntityType::BridgePolygon);
    // Multichain
    m.insert("0x4f3aff3a747fcade12598081e80c6605a8be192f", EntityType::BridgeMultichain);
    // Stargate
    m.insert("0x45a01e4e04f14f7a4a6880d0cbaf2c3c1acfbed4", EntityType::BridgeStargate);
    // Hop
    m.insert("0x76b22b8c1079a44f1211b0e72c5d26c5e3b3c3c9", EntityType::BridgeHop);
    // Uniswap V3
    m.insert("0xe592427a0aece92de3edee1f18e0157c05861564", EntityType::DexUniswap);
    m.insert("0x68b3465833fb72a70ecdf485e0e4c7bd8665fc45", EntityType::DexUniswap);
    // SushiSwap
    m.insert("0x1b02da8cb0d097eb8d57a175b88c7d8b47997506", EntityType::DexSushiswap);
    // QuickSwap
    m.insert("0xa5e0829caced8ffdd4de3c43696c57f7d7a678ff", EntityType::DexQuickswap);
    // 1inch
    m.insert("0x1111111254eeb25477b68fb85ed929f73a960582", EntityType::Dex1inch);
    // USDC (bridged + native)
    m.insert("0x2791bca1f2de4661ed88a30c99a7a9449aa84174", EntityType::TokenUsdc);
    m.insert("0x3c499c542cef5e3811e1192ce70d8cc03d5c3359", EntityType::TokenUsdc);
    // USDT
    m.insert("0xc2132d05d31c914a87c6611c10748aeb04b58e8f", EntityType::TokenUsdt);
    // WETH
    m.insert("0x7ceb23fd6bc0add59e62ac25578270cff1b9f619", EntityType::TokenWeth);
    // WMATIC
    m.insert("0x0d500b1d8e8ef31e21c99d1db9a6444d3adf1270", EntityType::TokenWmatic);
    // Aave V3
    m.insert("0x794a61358d6845594f94dc1db02a252b5b4814ad", EntityType::DefiAave);
    m.insert("0x8145edddf43f50276641b55bd3ad95944510021e", EntityType::DefiAave);
    m
}

pub struct EntityRegistry {
    entities: HashMap<String, EntityType>,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        let entities = known_entities()
            .into_iter()
            .map(|(addr, ty)| (addr.to_string(), ty))
            .collect();
        Self { entities }
    }

    pub fn with_custom(mut self, address: &str, entity_type: EntityType) -> Self {
        self.entities.insert(address.to_lowercase(), entity_type);
        self
    }

    pub fn classify(&self, address: &str) -> EntityType {
        self.entities
            .get(&address.to_lowercase())
            .copied()
            .unwrap_or(EntityType::Unknown)
    }

    pub fn is_known(&self, address: &str) -> bool {
        self.entities.contains_key(&address.to_lowercase())
    }

    pub fn is_cex(&self, address: &str) -> bool {
        self.classify(address).is_cex()
    }

    pub fn is_bridge(&self, address: &str) -> bool {
        self.classify(address).is_bridge()
    }

    pub fn is_dex(&self, address: &str) -> bool {
        self.classify(address).is_dex()
    }

    pub fn is_terminal(&self, address: &str) -> bool {
        self.classify(address).is_terminal()
    }

    pub fn is_contract(&self, address: &str) -> bool {
        let ty = self.classify(address);
        ty.is_dex()
            || matches!(
                ty,
                EntityType::TokenUsdc
                    | EntityType::TokenUsdt
                    | EntityType::TokenWeth
                    | EntityType::TokenWmatic
                    | EntityType::DefiAave
                    | EntityType::DefiCompound
                    | EntityType::DefiOther
                    | EntityType::Contract
            )
    }

    pub fn add_entity(&mut self, address: &str, entity_type: EntityType) {
        self.entities.insert(address.to_lowercase(), entity_type);
    }

    pub fn remove_entity(&mut self, address: &str) -> bool {
        self.entities.remove(&address.to_lowercase()).is_some()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_binance_wallet() {
        let registry = EntityRegistry::new();
        assert!(registry.is_cex("0x28C6C06298d514Db089934071355E5743bf21d60"));
    }

    #[test]
    fn unknown_address_is_not_terminal() {
        let registry = EntityRegistry::new();
        assert!(!registry.is_terminal("0x0000000000000000000000000000000000dead"));
    }

    #[test]
    fn custom_entity_is_classified() {
        let registry = EntityRegistry::new().with_custom("0xabc", EntityType::BridgeOther);
        assert!(registry.is_bridge("0xABC"));
    }

    #[test]
    fn remove_entity_drops_classification() {
        let mut registry = EntityRegistry::new();
        assert!(registry.remove_entity("0x28c6c06298d514db089934071355e5743bf21d60"));
        assert_eq!(
            registry.classify("0x28c6c06298d514db089934071355e5743bf21d60"),
            EntityType::Unknown
        );
    }
}
