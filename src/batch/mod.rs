pub mod batch_evaluator;
