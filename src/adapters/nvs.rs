//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`StoragePort`] and [`ConfigPort`] for the blestore
//! firmware.
//!
//! - Attribute values are stored as NVS strings in the `attrs` namespace;
//!   the config blob lives in its own namespace. Namespace isolation keeps
//!   the subsystems from colliding on keys.
//! - Writes commit before returning — ESP-IDF NVS commits are atomic per
//!   `nvs_commit()`, so a power loss never leaves a torn value.
//! - On non-ESP targets a `HashMap` simulation backend stands in so the
//!   full firmware logic runs in host tests.

use crate::app::attributes::{AttrValue, MAX_VALUE_LEN};
use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::DeviceConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "blestore";
const CONFIG_KEY: &str = "devcfg";
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(StorageError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                let ret2 = unsafe { nvs_flash_erase() };
                if ret2 != ESP_OK {
                    return Err(StorageError::IoError);
                }
                let ret3 = unsafe { nvs_flash_init() };
                if ret3 != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// NVS keys are limited to 15 bytes plus a terminator.
    #[cfg(target_os = "espidf")]
    fn key_buf(key: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let kb = key.as_bytes();
        let kl = kb.len().min(15);
        buf[..kl].copy_from_slice(&kb[..kl]);
        buf
    }
}

/// Degraded fallback when flash initialisation fails: the adapter still
/// satisfies the ports, but every NVS call will report errors until the
/// partition self-heals on the next reboot.
impl Default for NvsAdapter {
    fn default() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        }
    }
}

fn validate_config(cfg: &DeviceConfig) -> Result<(), ConfigError> {
    // Empty means "derive from MAC"; anything else must be a sane GAP name.
    if !super::utils::is_printable_ascii(&cfg.adv_name) {
        return Err(ConfigError::ValidationFailed(
            "adv_name must be printable ASCII",
        ));
    }
    Ok(())
}

impl StoragePort for NvsAdapter {
    fn get_str(&self, namespace: &str, key: &str) -> Result<Option<AttrValue>, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) => {
                    let s = core::str::from_utf8(data).map_err(|_| StorageError::IoError)?;
                    let mut out = AttrValue::new();
                    out.push_str(s).map_err(|_| StorageError::IoError)?;
                    Ok(Some(out))
                }
                None => Ok(None),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::key_buf(key);

                // NUL-terminated on the wire; reported size includes it.
                let mut buf = [0u8; MAX_VALUE_LEN + 1];
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_str(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let text_len = size.saturating_sub(1);
                Ok((buf, text_len))
            });
            match result {
                Ok((buf, text_len)) => {
                    let s = core::str::from_utf8(&buf[..text_len])
                        .map_err(|_| StorageError::IoError)?;
                    let mut out = AttrValue::new();
                    out.push_str(s).map_err(|_| StorageError::IoError)?;
                    Ok(Some(out))
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn put_str(&mut self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            if value.len() > MAX_VALUE_LEN {
                return Err(StorageError::IoError);
            }
            let composite = Self::composite_key(namespace, key);
            self.store
                .borrow_mut()
                .insert(composite, value.as_bytes().to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            // NUL-terminate for the C API.
            let mut val_buf = [0u8; MAX_VALUE_LEN + 1];
            let vb = value.as_bytes();
            if vb.len() > MAX_VALUE_LEN {
                return Err(StorageError::IoError);
            }
            val_buf[..vb.len()].copy_from_slice(vb);

            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = Self::key_buf(key);
                let ret = unsafe {
                    nvs_set_str(
                        handle,
                        key_buf.as_ptr() as *const _,
                        val_buf.as_ptr() as *const _,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => Ok(()),
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
                Err(e) => {
                    warn!("NvsAdapter: NVS string write error {}", e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::key_buf(key);
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = Self::key_buf(key);
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
                other => other.map_err(|_| StorageError::IoError),
            }
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = Self::key_buf(key);
                let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::key_buf(key);
                let ret = unsafe {
                    nvs_find_key(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => {
                let cfg: DeviceConfig =
                    postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", len);
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(DeviceConfig::default())
            }
            Err(e) => {
                warn!("NvsAdapter: config read error ({}), using defaults", e);
                Ok(DeviceConfig::default())
            }
        }
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        validate_config(config)?;

        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
            self.store.borrow_mut().insert(composite, bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
                let key_buf = Self::key_buf(CONFIG_KEY);
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS config write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}
