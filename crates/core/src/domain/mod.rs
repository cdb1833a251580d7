pub mod labels;
pub mod landing;
pub mod period;
pub mod records;
pub mod scenario;
pub mod weights;
