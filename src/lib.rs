extern crate bit_vec;
#[macro_use]
extern crate error_chain;
extern crate num_bigint;
extern crate num_traits;
extern crate serde;
extern crate serde_yaml;

pub mod environment;
pub mod expr;
pub mod fold;
pub mod ir;

pub mod error {
    error_chain! {
        types {
            Error, ErrorKind, ResultExt, Result;
        }

        foreign_links {
            IOError(::std::io::Error);
            SerdeYAML(::serde_yaml::Error);
        }

        errors {
            ConstantRequired(m: String) {
                description("A compile-time constant is required")
                display("Expression is not a compile-time constant: {}", m)
            }
            CircularLogic(m: String) {
                description("Wire is assigned to itself")
                display("Circular combinational logic: {}", m)
            }
            Inconsistent(m: String) {
                description("Internal consistency failure")
                display("Internal error (malformed tree): {}", m)
            }
        }
    }
}
