//! 处方模板存储
//!
//! 模板集合按用户划分，跨会话保留。读写都是本地同步操作，不是挂起点。

use clinic_core::{ClinicError, Result, Template};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

/// 模板集合仓库
pub trait TemplateRepository: Send + Sync {
    /// 读取完整集合；从未写入过时返回 `None`
    fn load(&self) -> Result<Option<Vec<Template>>>;

    /// 以完整集合覆盖已存储的内容
    fn store(&self, templates: &[Template]) -> Result<()>;
}

/// 内存模板仓库
#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    slot: Mutex<Option<Vec<Template>>>,
    writes: AtomicUsize,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(templates: Vec<Template>) -> Self {
        Self {
            slot: Mutex::new(Some(templates)),
            writes: AtomicUsize::new(0),
        }
    }

    /// 已发生的整体写入次数
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl TemplateRepository for InMemoryTemplateStore {
    fn load(&self) -> Result<Option<Vec<Template>>> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slot.clone())
    }

    fn store(&self, templates: &[Template]) -> Result<()> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(templates.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// JSON 文件模板仓库
#[derive(Debug, Clone)]
pub struct JsonFileTemplateStore {
    base_path: PathBuf,
    key_digest: String,
}

impl JsonFileTemplateStore {
    /// 文件名取用户标识的 SHA-256，不同用户不会落到同一文件
    pub fn new(base_path: impl AsRef<Path>, user_key: &str) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            key_digest: digest_user_key(user_key),
        }
    }

    /// 当前用户的模板文件路径
    pub fn path(&self) -> PathBuf {
        self.base_path
            .join(format!("prescription_templates_{}.json", self.key_digest))
    }
}

fn digest_user_key(user_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl TemplateRepository for JsonFileTemplateStore {
    fn load(&self) -> Result<Option<Vec<Template>>> {
        let path = self.path();
        if !path.exists() {
            debug!("No template file at {}", path.display());
            return Ok(None);
        }

        let data = std::fs::read(&path)?;
        let templates: Vec<Template> = serde_json::from_slice(&data)?;
        debug!("Loaded {} templates from {}", templates.len(), path.display());
        Ok(Some(templates))
    }

    fn store(&self, templates: &[Template]) -> Result<()> {
        std::fs::create_dir_all(&self.base_path)?;

        let path = self.path();
        let staging = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(templates)?;

        // 先写临时文件再改名，保证整体替换
        std::fs::write(&staging, data)?;
        std::fs::rename(&staging, &path).map_err(|e| {
            ClinicError::Storage(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        info!("Stored {} templates to {}", templates.len(), path.display());
        Ok(())
    }
}
