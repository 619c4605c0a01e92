//! AuthGate - credential の検証
//!
//! # 設計
//! - DeviceRegistry は起動時に構築し、以後は不変（ロック不要）
//! - 未登録とクラス違いは呼び出し側に区別させない（credential の列挙対策）

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::domain::{DeviceClass, GatewayError};

/// RegistryError は DeviceRegistry の構築エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("credential is already registered (class {0})")]
    AlreadyRegistered(DeviceClass),

    #[error("credential must not be empty")]
    EmptyCredential,
}

/// credential -> DeviceClass
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, DeviceClass>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        credential: impl Into<String>,
        class: DeviceClass,
    ) -> Result<(), RegistryError> {
        let credential = credential.into();
        if credential.is_empty() {
            return Err(RegistryError::EmptyCredential);
        }
        if let Some(existing) = self.devices.get(&credential) {
            return Err(RegistryError::AlreadyRegistered(*existing));
        }
        self.devices.insert(credential, class);
        Ok(())
    }

    pub fn class_of(&self, credential: &str) -> Option<DeviceClass> {
        self.devices.get(credential).copied()
    }

    pub fn classes(&self) -> HashSet<DeviceClass> {
        self.devices.values().copied().collect()
    }

}

#[derive(Debug, Clone)]
pub struct AuthGate {
    registry: Arc<DeviceRegistry>,
}

impl AuthGate {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self { registry }
    }

    /// 登録済みで、かつ `required` クラスに紐づく credential のみ通す
    pub fn authenticate(&self, credential: Option<&str>, required: DeviceClass) -> bool {
        credential
            .and_then(|c| self.registry.class_of(c))
            .is_some_and(|class| class == required)
    }

    pub fn require(
        &self,
        credential: Option<&str>,
        required: DeviceClass,
    ) -> Result<(), GatewayError> {
        if self.authenticate(credential, required) {
            Ok(())
        } else {
            warn!(required = %required, "unauthorized access attempt");
            Err(GatewayError::Unauthorized)
        }
    }
}
