//! vthread_bench 核心库入口
//!
//! 对比两种执行策略: 可复用的平台线程池 与 每任务一个轻量执行上下文的虚拟线程池。

pub mod bench;
pub mod config;
pub mod engine;
pub mod pool;
pub mod sequence;
pub mod work;
pub mod worker;

/// 单个工作项的失败类型
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkError {
    #[error("工作项 {index} 挂起期间被中断")]
    Interrupted { index: usize },

    #[error("工作项 {index} 发生panic: {message}")]
    Panicked { index: usize, message: String },

    #[error("工作项 {index} 未产生结果即被丢弃")]
    Lost { index: usize },
}

/// 通用错误类型
#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("无法读取配置文件 {path}: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("配置文件解析失败: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("执行池已关闭")]
    Closed,

    #[error("工作线程创建失败: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("运行时创建失败: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("{total} 个工作项中有 {failed} 个失败 (首个: {first})")]
    TaskFailures {
        failed: usize,
        total: usize,
        first: WorkError,
    },

    #[error("序列为空")]
    EmptySequence,
}

impl PoolError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        PoolError::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;

// 公开导出模块的公共接口
pub use bench::{run_benchmark, run_suite, submit_all, Measurement};
pub use config::{BenchConfig, BenchConfigBuilder, PlatformConfig, VirtualConfig};
pub use engine::VirtualPool;
pub use pool::{open, Drained, ExecutionPool, PoolKind};
pub use sequence::Sequenced;
pub use work::{Action, TaskHandle, WorkItem};
pub use worker::PlatformPool;
