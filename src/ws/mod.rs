pub mod sessionctx;
