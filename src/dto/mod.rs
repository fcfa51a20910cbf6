pub mod learning_dto;
