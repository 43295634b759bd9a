/// Implement `Serialize` and `Deserialize` for a device type by going through its property
/// string, so the serialized form is exactly what PVE stores in the guest config.
macro_rules! property_string_serde {
    ($type_name:ident, $expecting:literal) => {
        #[cfg(feature = "serde")]
        impl serde::Serialize for $type_name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                use serde::ser::Error;

                serializer.serialize_str(&self.to_property_string().map_err(S::Error::custom)?)
            }
        }

        #[cfg(feature = "serde")]
        impl<'de> serde::Deserialize<'de> for $type_name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                struct V;

                impl serde::de::Visitor<'_> for V {
                    type Value = $type_name;

                    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                        f.write_str($expecting)
                    }

                    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
                    where
                        E: serde::de::Error,
                    {
                        $type_name::parse_property_string(s).map_err(E::custom)
                    }
                }

                deserializer.deserialize_str(V)
            }
        }
    };
}

pub(crate) use property_string_serde;
