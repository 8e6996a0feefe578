//! Diesel conversions for id newtypes and string-backed enums.
//!
//! Every id in the service is an `i32` wrapped in its own type so that an
//! `OrderId` can never be passed where a `CourseId` is expected. The macros
//! below give those wrappers (and the status enums stored as `VARCHAR`)
//! the `ToSql` / `FromSql` impls diesel needs; the `FromSqlRow` and
//! `AsExpression` derives are put on the types themselves.

/// Postgres `INTEGER` conversions and `Display` for an `i32` newtype
macro_rules! int_newtype_sql {
    ($name:ident) => {
        impl ::diesel::serialize::ToSql<::diesel::sql_types::Integer, ::diesel::pg::Pg> for $name {
            fn to_sql<W: ::std::io::Write>(&self, out: &mut ::diesel::serialize::Output<W, ::diesel::pg::Pg>) -> ::diesel::serialize::Result {
                <i32 as ::diesel::serialize::ToSql<::diesel::sql_types::Integer, ::diesel::pg::Pg>>::to_sql(&self.0, out)
            }
        }

        impl ::diesel::deserialize::FromSql<::diesel::sql_types::Integer, ::diesel::pg::Pg> for $name {
            fn from_sql(bytes: Option<&[u8]>) -> ::diesel::deserialize::Result<Self> {
                <i32 as ::diesel::deserialize::FromSql<::diesel::sql_types::Integer, ::diesel::pg::Pg>>::from_sql(bytes).map($name)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Postgres `VARCHAR` conversions and `Display` for a `String` newtype
macro_rules! text_newtype_sql {
    ($name:ident) => {
        impl ::diesel::serialize::ToSql<::diesel::sql_types::Text, ::diesel::pg::Pg> for $name {
            fn to_sql<W: ::std::io::Write>(&self, out: &mut ::diesel::serialize::Output<W, ::diesel::pg::Pg>) -> ::diesel::serialize::Result {
                <String as ::diesel::serialize::ToSql<::diesel::sql_types::Text, ::diesel::pg::Pg>>::to_sql(&self.0, out)
            }
        }

        impl ::diesel::deserialize::FromSql<::diesel::sql_types::Text, ::diesel::pg::Pg> for $name {
            fn from_sql(bytes: Option<&[u8]>) -> ::diesel::deserialize::Result<Self> {
                <String as ::diesel::deserialize::FromSql<::diesel::sql_types::Text, ::diesel::pg::Pg>>::from_sql(bytes).map($name)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Maps enum variants onto the lowercase strings stored in the database
macro_rules! text_enum_sql {
    ($name:ident { $($variant:ident => $value:tt),+ $(,)* }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match *self {
                    $($name::$variant => $value,)+
                }
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ::failure::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => Err(format_err!("Unknown {} value: {}", stringify!($name), other)),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl ::diesel::serialize::ToSql<::diesel::sql_types::Text, ::diesel::pg::Pg> for $name {
            fn to_sql<W: ::std::io::Write>(&self, out: &mut ::diesel::serialize::Output<W, ::diesel::pg::Pg>) -> ::diesel::serialize::Result {
                ::std::io::Write::write_all(out, self.as_str().as_bytes())?;
                Ok(::diesel::serialize::IsNull::No)
            }
        }

        impl ::diesel::deserialize::FromSql<::diesel::sql_types::Text, ::diesel::pg::Pg> for $name {
            fn from_sql(bytes: Option<&[u8]>) -> ::diesel::deserialize::Result<Self> {
                let value = <String as ::diesel::deserialize::FromSql<::diesel::sql_types::Text, ::diesel::pg::Pg>>::from_sql(bytes)?;
                value.parse::<$name>().map_err(|e| e.to_string().into())
            }
        }
    };
}
