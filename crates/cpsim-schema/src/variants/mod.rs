//! ---
//! cpsim_section: "02-schema-data-model"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Typed representations for each schema variant."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! Typed representations, one module per schema variant.

/// Implement [`ApiObject`](crate::resource::ApiObject) for structs carrying
/// `api_version` and `metadata.{name,namespace}`.
macro_rules! api_object {
    ($($ty:ident => $kind:literal),+ $(,)?) => {
        $(
            impl $crate::resource::ApiObject for $ty {
                fn api_version(&self) -> &str {
                    &self.api_version
                }

                fn kind(&self) -> &str {
                    $kind
                }

                fn name(&self) -> &str {
                    &self.metadata.name
                }

                fn namespace(&self) -> &str {
                    &self.metadata.namespace
                }
            }
        )+
    };
}

/// Implement [`ApiObject`](crate::resource::ApiObject) for a kind-tagged
/// enum whose variants wrap same-named structs, plus `From` for each.
macro_rules! object_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::resource::ApiObject for $name {
            fn api_version(&self) -> &str {
                match self {
                    $(Self::$variant(object) => object.api_version(),)+
                }
            }

            fn kind(&self) -> &str {
                match self {
                    $(Self::$variant(object) => object.kind(),)+
                }
            }

            fn name(&self) -> &str {
                match self {
                    $(Self::$variant(object) => object.name(),)+
                }
            }

            fn namespace(&self) -> &str {
                match self {
                    $(Self::$variant(object) => object.namespace(),)+
                }
            }
        }

        $(
            impl From<$variant> for $name {
                fn from(object: $variant) -> Self {
                    Self::$variant(object)
                }
            }
        )+
    };
}

pub mod full;
pub mod mesh;
pub mod slim;
