pub mod storage_paths;
