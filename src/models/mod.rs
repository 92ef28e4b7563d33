mod api;

pub use api::{
    CpuUsage, HealthResponse, LoggingStatus, MemoryReport, MemoryUsage,
    PerformanceMetricsResponse, RuntimeEnvironment, ServicesStatus, SystemReport,
    SystemStatusResponse, UploadsStatus,
};
