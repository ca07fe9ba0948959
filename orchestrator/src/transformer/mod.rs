mod request;
mod response;

pub use request::RequestTransformer;
pub use response::{
    build_request_index, DefaultResponseFormatParser, ResponseFormatParser, ResponseTransformer,
};
