use crate::error::ConvertError;
use model::records::record::{Record, Records};
use std::{collections::HashMap, fmt, sync::Arc};

pub const IDENTITY: &str = "none";

/// Expands one raw record into zero or more logical records.
pub trait Convertor: Send + Sync {
    fn apply(&self, values: Record) -> Result<Records, ConvertError>;
}

/// Passes the raw record through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConvertor;

impl Convertor for IdentityConvertor {
    fn apply(&self, values: Record) -> Result<Records, ConvertError> {
        Ok(vec![values])
    }
}

/// Adapts a closure into a [`Convertor`].
pub struct FnConvertor<F>(pub F);

impl<F> Convertor for FnConvertor<F>
where
    F: Fn(Record) -> Result<Records, ConvertError> + Send + Sync,
{
    fn apply(&self, values: Record) -> Result<Records, ConvertError> {
        (self.0)(values)
    }
}

/// Named convertors handed to readers at construction.
#[derive(Clone)]
pub struct ConvertorRegistry {
    convertors: HashMap<String, Arc<dyn Convertor>>,
}

impl ConvertorRegistry {
    pub fn new() -> Self {
        let mut convertors: HashMap<String, Arc<dyn Convertor>> = HashMap::new();
        convertors.insert(IDENTITY.to_string(), Arc::new(IdentityConvertor));
        Self { convertors }
    }

    pub fn register<C: Convertor + 'static>(mut self, name: &str, convertor: C) -> Self {
        self.convertors.insert(name.to_string(), Arc::new(convertor));
        self
    }

    /// Looks up `name`, falling back to the identity convertor.
    pub fn get(&self, name: &str) -> Arc<dyn Convertor> {
        match self.convertors.get(name) {
            Some(c) => c.clone(),
            None => {
                tracing::debug!(convertor = %name, "Unknown convertor, using identity");
                Arc::new(IdentityConvertor)
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.convertors.contains_key(name)
    }
}

impl Default for ConvertorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConvertorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.convertors.keys().collect();
        names.sort();
        f.debug_struct("ConvertorRegistry")
            .field("convertors", &names)
            .finish()
    }
}
