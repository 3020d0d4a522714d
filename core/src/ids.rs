//! Identifier newtypes.
//!
//! Every aggregate is keyed by a random UUID wrapped in its own type so that
//! an `OrderId` can never be passed where an `EventId` is expected.

/// Declares a UUID-backed identifier newtype.
///
/// The generated type is `Copy`, hashable, serializes transparently as the
/// UUID string and displays as the hyphenated UUID.
///
/// ```
/// kassa_core::uuid_id! {
///     /// Unique identifier for a widget
///     pub struct WidgetId;
/// }
///
/// let id = WidgetId::new();
/// assert_eq!(WidgetId::from_uuid(*id.as_uuid()), id);
/// ```
#[macro_export]
macro_rules! uuid_id {
    ($(#[$meta:meta])* pub struct $name:ident;) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(::uuid::Uuid::new_v4())
            }

            #[doc = concat!("Creates a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: ::uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &::uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                ::uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an organization (the tenant)
    pub struct OrganizationId;
}

uuid_id! {
    /// Unique identifier for a user account
    pub struct UserId;
}
